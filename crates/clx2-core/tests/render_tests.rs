// End-to-end frames: display lists built in VRAM the way the tile
// accelerator would lay them out, rendered through the public entry point,
// checked against hand-computed framebuffer bytes.

use clx2_core::regs::*;
use clx2_core::vram::{pvr_map32, Vram, VRAM_SIZE};
use clx2_core::RenderError;

const REGION_BASE: u32 = 0x0010_0000;
const OBJECT_LISTS: u32 = 0x0000_8000;
const PARAM_BLOCKS: u32 = 0x0000_1000;
const FRAMEBUFFER: u32 = 0x0020_0000;
// Raw 64-bit-view texture bytes; the physical range does not collide with
// the mapped addresses above.
const TEXTURE: u32 = 0x0010_0000;

const LIST_EMPTY: u32 = 0x8000_0000;
const LINK_EOL: u32 = (0b111 << 29) | (1 << 28);

struct Frame {
    vram: Box<[u8; VRAM_SIZE]>,
    regs: Box<[u32; REG_WORDS]>,
}

impl Frame {
    fn new() -> Self {
        let mut frame = Frame {
            vram: vec![0u8; VRAM_SIZE].into_boxed_slice().try_into().ok().unwrap(),
            regs: vec![0u32; REG_WORDS].into_boxed_slice().try_into().ok().unwrap(),
        };

        frame.reg(REGION_BASE_ADDR, REGION_BASE);
        frame.reg(PARAM_BASE_ADDR, 0);
        frame.reg(FB_W_SOF1_ADDR, FRAMEBUFFER);
        frame.reg(FB_W_CTRL_ADDR, 6); // ARGB8888
        frame.reg(FB_W_LINESTRIDE_ADDR, 80); // 640 bytes per line
        frame.reg(SCALER_CTL_ADDR, 0x400);
        frame.reg(FPU_PARAM_CFG_ADDR, 1 << 21); // 6-word region entries
        frame.reg(ISP_BACKGND_D_ADDR, 0.00001f32.to_bits());
        frame
    }

    fn reg(&mut self, byte_addr: u32, value: u32) {
        self.regs[byte_addr as usize / 4] = value;
    }

    /// Write through the 32-bit view, as the TA would.
    fn w32(&mut self, addr: u32, value: u32) {
        Vram::new(&mut self.vram).write32(addr, value);
    }

    /// Read back through the 32-bit view.
    fn r32(&self, addr: u32) -> u32 {
        let p = pvr_map32(addr) as usize;
        u32::from_le_bytes(self.vram[p..p + 4].try_into().unwrap())
    }

    fn wf32(&mut self, addr: u32, value: f32) {
        self.w32(addr, value.to_bits());
    }

    /// Background parameter block: a far, flat, fully transparent plane that
    /// blends to zero. Returns the ISP_BACKGND_T value for it.
    fn install_background(&mut self, at: u32) -> u32 {
        self.w32(at, 7 << 29); // depth always
        self.w32(at + 4, (1 << 29) | (1 << 20)); // src ONE, dst ZERO, use alpha
        self.w32(at + 8, 0);
        let mut p = at + 12;
        for (x, y) in [(0.0f32, 0.0f32), (640.0, 0.0), (0.0, 480.0)] {
            self.wf32(p, x);
            self.wf32(p + 4, y);
            self.wf32(p + 8, 0.00001);
            self.w32(p + 12, 0); // transparent black
            p += 16;
        }
        // skip=1, tag_offset=0, offset in words from PARAM_BASE
        ((at / 4) << 3) | (1 << 24)
    }

    fn render(&mut self) -> Result<(), RenderError> {
        clx2_core::render(&mut self.vram, &self.regs)
    }

    fn fb_pixel(&self, x: u32, y: u32) -> u32 {
        self.r32(FRAMEBUFFER + y * 640 + x * 4)
    }
}

/// Region array entry in the 6-word format. Unused lists stay empty.
struct Region {
    control: u32,
    opaque: u32,
    opaque_mod: u32,
    trans: u32,
    trans_mod: u32,
    puncht: u32,
}

impl Region {
    fn new(control: u32) -> Self {
        Region {
            control,
            opaque: LIST_EMPTY,
            opaque_mod: LIST_EMPTY,
            trans: LIST_EMPTY,
            trans_mod: LIST_EMPTY,
            puncht: LIST_EMPTY,
        }
    }

    fn write(&self, frame: &mut Frame, at: u32) {
        frame.w32(at, self.control);
        frame.w32(at + 4, self.opaque);
        frame.w32(at + 8, self.opaque_mod);
        frame.w32(at + 12, self.trans);
        frame.w32(at + 16, self.trans_mod);
        frame.w32(at + 20, self.puncht);
    }
}

const LAST_REGION: u32 = 1 << 31;
const Z_KEEP: u32 = 1 << 30;
const PRE_SORT: u32 = 1 << 29;

/// Morton interleave for a 32x32 twiddled texture, y bit first.
fn twiddle32(x: u32, y: u32) -> u32 {
    let mut rv = 0;
    for b in 0..5 {
        rv |= ((y >> b) & 1) << (2 * b);
        rv |= ((x >> b) & 1) << (2 * b + 1);
    }
    rv
}

/// Untextured triangle parameter block (skip 1): ISP/TSP/TCW then
/// x, y, z, packed color per vertex.
fn write_triangle_block(
    frame: &mut Frame,
    at: u32,
    isp: u32,
    tsp: u32,
    verts: &[(f32, f32, f32, u32)],
) -> u32 {
    frame.w32(at, isp);
    frame.w32(at + 4, tsp);
    frame.w32(at + 8, 0);
    let mut p = at + 12;
    for &(x, y, z, col) in verts {
        frame.wf32(p, x);
        frame.wf32(p + 4, y);
        frame.wf32(p + 8, z);
        frame.w32(p + 12, col);
        p += 16;
    }
    p
}

/// S1: one solid red triangle through the opaque list, 8888 writeback.
fn single_triangle_frame() -> Frame {
    let mut frame = Frame::new();

    let bg_tag = frame.install_background(PARAM_BLOCKS);
    frame.reg(ISP_BACKGND_T_ADDR, bg_tag);

    let tri_block = PARAM_BLOCKS + 0x100;
    write_triangle_block(
        &mut frame,
        tri_block,
        7 << 29, // depth always, no texture, flat
        1 << 29, // src ONE, dst ZERO
        &[
            (0.0, 0.0, 1.0, 0xFF00_00FF),
            (32.0, 0.0, 1.0, 0xFF00_00FF),
            (0.0, 32.0, 1.0, 0xFF00_00FF),
        ],
    );

    // Triangle array, one primitive, skip 1.
    frame.w32(OBJECT_LISTS, (0b100 << 29) | (1 << 21) | (tri_block / 4));
    frame.w32(OBJECT_LISTS + 4, LINK_EOL);

    let mut region = Region::new(LAST_REGION);
    region.opaque = OBJECT_LISTS;
    region.write(&mut frame, REGION_BASE);

    frame
}

#[test]
fn s1_single_opaque_triangle() {
    let mut frame = single_triangle_frame();
    frame.render().unwrap();

    for y in 0..32 {
        for x in 0..32 {
            let expected = if x + y <= 31 { 0xFF00_00FF } else { 0 };
            assert_eq!(frame.fb_pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn s2_z_keep_leaves_vram_untouched() {
    let mut reference = single_triangle_frame();
    reference.render().unwrap();

    // Same frame plus a z-keep region with no lists: the second pass must
    // not disturb what the first wrote.
    let mut frame = single_triangle_frame();
    let mut first = Region::new(0);
    first.opaque = OBJECT_LISTS;
    first.write(&mut frame, REGION_BASE);
    Region::new(LAST_REGION | Z_KEEP).write(&mut frame, REGION_BASE + 24);

    frame.render().unwrap();

    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(
                frame.fb_pixel(x, y),
                reference.fb_pixel(x, y),
                "pixel ({x}, {y})"
            );
        }
    }
}

#[test]
fn s3_punch_through_alpha_test() {
    let mut frame = Frame::new();
    frame.reg(PT_ALPHA_REF_ADDR, 128);

    let bg_tag = frame.install_background(PARAM_BLOCKS);
    frame.reg(ISP_BACKGND_T_ADDR, bg_tag);

    // ARGB1555 texture, 32x32, twiddled: full red, alpha bit set where the
    // texel column is at least 16.
    for y in 0..32u32 {
        for x in 0..32u32 {
            let texel: u16 = 0x001F | if x >= 16 { 0x8000 } else { 0 };
            let addr = (TEXTURE + twiddle32(x, y) * 2) as usize;
            frame.vram[addr..addr + 2].copy_from_slice(&texel.to_le_bytes());
        }
    }

    // Textured triangle, skip 3: x, y, z, u, v, color.
    let tri_block = PARAM_BLOCKS + 0x100;
    frame.w32(tri_block, (7 << 29) | (1 << 25)); // depth always, textured
    frame.w32(tri_block + 4, (1 << 29) | (1 << 20) | (2 << 3) | 2); // ONE/ZERO, alpha, 32x32
    frame.w32(tri_block + 8, TEXTURE >> 3); // twiddled ARGB1555
    let mut p = tri_block + 12;
    for (x, y, u, v) in [
        (0.0f32, 0.0f32, 0.0f32, 0.0f32),
        (32.0, 0.0, 1.0, 0.0),
        (0.0, 32.0, 0.0, 1.0),
    ] {
        frame.wf32(p, x);
        frame.wf32(p + 4, y);
        frame.wf32(p + 8, 1.0);
        frame.wf32(p + 12, u);
        frame.wf32(p + 16, v);
        frame.w32(p + 20, 0xFFFF_FFFF);
        p += 24;
    }

    frame.w32(OBJECT_LISTS, (0b100 << 29) | (3 << 21) | (tri_block / 4));
    frame.w32(OBJECT_LISTS + 4, LINK_EOL);

    let mut region = Region::new(LAST_REGION);
    region.puncht = OBJECT_LISTS;
    region.write(&mut frame, REGION_BASE);

    frame.render().unwrap();

    for y in 0..32 {
        for x in 0..32 {
            let covered = x + y <= 31;
            let expected = if covered && x >= 16 { 0xFF00_00F8 } else { 0 };
            assert_eq!(frame.fb_pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }
}

/// Two 16x16 half-alpha quads (red under blue) through the translucent list.
fn overlapping_quads_frame(control: u32) -> Frame {
    let mut frame = Frame::new();

    let bg_tag = frame.install_background(PARAM_BLOCKS);
    frame.reg(ISP_BACKGND_T_ADDR, bg_tag);

    // Quad array, two primitives, skip 1. Blocks are consecutive.
    let isp = (7 << 29) | (1 << 26) | (1 << 23); // always, no z write, gouraud
    let tsp = (4 << 29) | (5 << 26) | (1 << 20); // src alpha / inv src alpha
    let quad = [
        (0.0f32, 0.0f32),
        (16.0, 0.0),
        (16.0, 16.0),
        (0.0, 16.0),
    ];

    let mut p = PARAM_BLOCKS + 0x100;
    let first_block = p;
    for color in [0x8000_00FFu32, 0x80FF_0000] {
        frame.w32(p, isp);
        frame.w32(p + 4, tsp);
        frame.w32(p + 8, 0);
        p += 12;
        for &(x, y) in &quad {
            frame.wf32(p, x);
            frame.wf32(p + 4, y);
            frame.wf32(p + 8, 1.0);
            frame.w32(p + 12, color);
            p += 16;
        }
    }

    frame.w32(
        OBJECT_LISTS,
        (0b101 << 29) | (1 << 25) | (1 << 21) | (first_block / 4),
    );
    frame.w32(OBJECT_LISTS + 4, LINK_EOL);

    let mut region = Region::new(control);
    region.trans = OBJECT_LISTS;
    region.write(&mut frame, REGION_BASE);

    frame
}

// blend(color1, blend(color0, background)) with src-alpha / inv-src-alpha at
// half alpha: r = 63, b = 128, a = 96.
const QUADS_EXPECTED: u32 = 0x6080_003F;

#[test]
fn s4_translucent_presort_painters_order() {
    let mut frame = overlapping_quads_frame(LAST_REGION | PRE_SORT);
    frame.render().unwrap();

    assert_eq!(frame.fb_pixel(0, 0), QUADS_EXPECTED);
    assert_eq!(frame.fb_pixel(15, 15), QUADS_EXPECTED);
    assert_eq!(frame.fb_pixel(16, 16), 0, "outside the quads");
}

#[test]
fn s5_autosort_matches_presort_on_coplanar_quads() {
    let mut presort = overlapping_quads_frame(LAST_REGION | PRE_SORT);
    presort.render().unwrap();

    let mut autosort = overlapping_quads_frame(LAST_REGION);
    autosort.render().unwrap();

    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(
                autosort.fb_pixel(x, y),
                presort.fb_pixel(x, y),
                "pixel ({x}, {y})"
            );
        }
    }
    assert_eq!(autosort.fb_pixel(0, 0), QUADS_EXPECTED);
}

#[test]
fn rgb565_writeback_dithers_the_tile() {
    let mut frame = single_triangle_frame();
    frame.reg(FB_W_CTRL_ADDR, 1); // RGB565

    frame.render().unwrap();

    for y in 0..32u32 {
        for x in 0..16u32 {
            let pair = frame.r32(FRAMEBUFFER + y * 640 + x * 4);
            for (i, packed) in [(0u32, pair & 0xFFFF), (1, pair >> 16)] {
                let px = x * 2 + i;
                let covered = px + y <= 31;
                // Red quantizes to full scale regardless of threshold;
                // green and blue stay zero.
                let expected = if covered { 0x001F } else { 0 };
                assert_eq!(packed, expected, "pixel ({px}, {y})");
            }
        }
    }
}

#[test]
fn unterminated_region_array_is_malformed() {
    let mut frame = Frame::new();
    let bg_tag = frame.install_background(PARAM_BLOCKS);
    frame.reg(ISP_BACKGND_T_ADDR, bg_tag);

    // 1025 entries, none carrying the last-region flag.
    for i in 0..1025 {
        Region::new(0).write(&mut frame, REGION_BASE + i * 24);
    }

    assert!(matches!(
        frame.render(),
        Err(RenderError::MalformedList(_))
    ));
}

#[test]
fn unsupported_pack_mode_aborts_frame() {
    let mut frame = single_triangle_frame();
    frame.reg(FB_W_CTRL_ADDR, 3);

    match frame.render() {
        Err(RenderError::ConfigurationUnsupported { register, .. }) => {
            assert_eq!(register, "FB_W_CTRL");
        }
        other => panic!("expected configuration error, got {other:?}"),
    }

    // The aborted frame never reached writeback.
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(frame.fb_pixel(x, y), 0);
        }
    }
}

#[test]
fn unsupported_scaler_aborts_frame() {
    let mut frame = single_triangle_frame();
    frame.reg(SCALER_CTL_ADDR, 0x400 | (1 << 17)); // interlace

    assert!(matches!(
        frame.render(),
        Err(RenderError::ConfigurationUnsupported {
            register: "SCALER_CTL",
            ..
        })
    ));
}
