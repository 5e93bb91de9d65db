// TSP stage: resolve a pixel's tag to its draw state and produce a shaded,
// fogged, blended color in the tile accumulator. Texture fetch covers
// twiddled and stride-scan layouts, six pixel formats, palettes, bump maps
// and VQ compression.

use crate::regs::Registers;
use crate::tex;
use crate::tile::{FpuEntry, PlaneStepper, TileBuffers, ACCUM_AUX, ACCUM_OUT};
use crate::types::{
    Tcw, Tsp, PIXEL_1555, PIXEL_4444, PIXEL_565, PIXEL_BUMPMAP, PIXEL_PAL4, PIXEL_PAL8,
    PIXEL_RESERVED, PIXEL_YUV,
};
use crate::vram::Vram;

/// Working color. Byte order matches the packed accumulator word: red in the
/// low byte, alpha in the high byte.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        let [r, g, b, a] = raw.to_le_bytes();
        Self { r, g, b, a }
    }

    #[inline]
    pub fn to_raw(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }
}

/// Offset color before any primitive has interpolated one; bump parameters
/// read it when the offset flag is clear.
const OFFS_DEFAULT: Color = Color {
    r: 0x00,
    g: 0x40,
    b: 0x80,
    a: 0x20,
};

/// Widen a u8 to 0..256 scale so 255 multiplies as a true one.
#[inline]
fn to_u8_256(v: u8) -> u32 {
    v as u32 + ((v as u32) >> 7)
}

/// Word offsets of each mipmap level base, smallest first. The 1x1 level of
/// 16-bpp textures sits at byte offset 6, hence the odd first entry.
const MIP_POINT: [u32; 11] = [
    0x00003,
    0x00001 * 4,
    0x00002 * 4,
    0x00006 * 4,
    0x00016 * 4,
    0x00056 * 4,
    0x00156 * 4,
    0x00556 * 4,
    0x01556 * 4,
    0x05556 * 4,
    0x15556 * 4,
];

/// Apply the per-axis addressing mode to a texel coordinate.
#[inline]
fn clamp_flip(coord: i32, size: i32, clamp: bool, flip: bool) -> i32 {
    if clamp {
        coord.clamp(0, size - 1)
    } else if flip {
        let mut c = coord & (size * 2 - 1);
        if c & size != 0 {
            c ^= size * 2 - 1;
        }
        c
    } else {
        coord & (size - 1)
    }
}

#[inline]
fn tex_address_gen(vq_comp: bool, tcw: Tcw) -> u32 {
    let base = tcw.tex_addr() << 3;
    if vq_comp {
        // Data bytes follow the 256-entry, 8-byte codebook.
        base + 256 * 4 * 2
    } else {
        base
    }
}

/// Texel offset within the texture for (u, v), honoring twiddling, stride
/// scan-out and the mipmap level base.
#[inline]
fn tex_offset_gen(
    vq_comp: bool,
    mip_mapped: bool,
    scan_order: bool,
    tsp: Tsp,
    u: i32,
    v: i32,
    stride: u32,
    mip_level: u32,
) -> u32 {
    let mip_offset = if mip_mapped {
        MIP_POINT[(3 + tsp.tex_u()).saturating_sub(mip_level) as usize]
    } else {
        0
    };

    if vq_comp || !scan_order {
        let (bcx, bcy) = if mip_mapped {
            let b = tsp.tex_u().saturating_sub(mip_level);
            (b, b)
        } else {
            (tsp.tex_u(), tsp.tex_v())
        };
        mip_offset + tex::twiddled_offset(u as u32, v as u32, bcx, bcy)
    } else {
        mip_offset + u as u32 + stride * v as u32
    }
}

/// Bits per pixel in half-bit units (VQ indices pack below one byte).
#[inline]
const fn bits_per_pixel(vq_comp: bool, pixel_fmt: u32) -> u32 {
    let bits = match pixel_fmt {
        PIXEL_PAL8 => 8,
        PIXEL_PAL4 => 4,
        _ => 16,
    };

    if vq_comp {
        8 * 2 / (64 / bits)
    } else {
        bits * 2
    }
}

#[inline]
fn tex_stride(regs: Registers, stride_sel: bool, scan_order: bool, tex_u: u32, mip_level: u32) -> u32 {
    if stride_sel && scan_order {
        (regs.text_control() & 31) * 32
    } else {
        (8u32 << tex_u) >> mip_level
    }
}

/// Replace a fetched bus word with its VQ codebook entry.
#[inline]
fn vq_lookup(vram: &Vram, codebook: u32, memtel: u64, offset: u32) -> u64 {
    let index = memtel.to_le_bytes()[(offset & 7) as usize];
    vram.read_texel64(codebook + index as u32 * 8)
}

/// Pull one texel out of a 64-bit bus word.
#[inline]
fn decode_textel(regs: Registers, pixel_fmt: u32, pal_select: u32, memtel: u64, offset: u32) -> u32 {
    let bytes = memtel.to_le_bytes();

    match pixel_fmt {
        PIXEL_RESERVED | PIXEL_1555 | PIXEL_565 | PIXEL_4444 | PIXEL_BUMPMAP => {
            let lane = ((offset & 3) * 2) as usize;
            u16::from_le_bytes([bytes[lane], bytes[lane + 1]]) as u32
        }
        PIXEL_YUV => {
            // A 32-bit word carries two luma samples around shared chroma.
            let lane = ((offset & 1) * 4) as usize;
            let y = bytes[lane + 1 + (offset & 2) as usize] as i32;
            let yu = bytes[lane] as i32;
            let yv = bytes[lane + 2] as i32;
            tex::yuv422(y, yu, yv)
        }
        PIXEL_PAL4 => {
            let local = ((memtel >> ((offset & 15) * 4)) & 15) as u32;
            regs.palette(pal_select * 16 | local)
        }
        PIXEL_PAL8 => {
            let local = bytes[(offset & 7) as usize] as u32;
            regs.palette((pal_select / 16) * 256 | local)
        }
        _ => 0xDEAD_BEEF,
    }
}

/// How a decoded texel expands to the packed 32-bit working format.
#[inline]
fn expand_format(regs: Registers, pixel_fmt: u32) -> u32 {
    if pixel_fmt == PIXEL_PAL4 || pixel_fmt == PIXEL_PAL8 {
        regs.pal_ram_ctrl() & 3
    } else if pixel_fmt == PIXEL_BUMPMAP || pixel_fmt == PIXEL_YUV {
        3
    } else {
        pixel_fmt & 3
    }
}

#[inline]
fn expand_to_argb(color: u32, mode: u32) -> u32 {
    match mode {
        0 => tex::unpack_1555(color as u16),
        1 => tex::unpack_565(color as u16),
        2 => tex::unpack_4444(color as u16),
        3 => tex::unpack_8888(color),
        _ => 0xDEAD_BEEF,
    }
}

/// Fetch and expand a single texel.
#[allow(clippy::too_many_arguments)]
fn texture_fetch(
    regs: Registers,
    vram: &Vram,
    tsp: Tsp,
    tcw: Tcw,
    pixel_fmt: u32,
    u: i32,
    v: i32,
    mip_level: u32,
) -> Color {
    // The smallest YUV level has no chroma pair left; it decodes as 565.
    if mip_level == tsp.tex_u() + 3 && pixel_fmt == PIXEL_YUV {
        return texture_fetch(regs, vram, tsp, tcw, PIXEL_565, u, v, mip_level);
    }

    let palettized = pixel_fmt == PIXEL_PAL4 || pixel_fmt == PIXEL_PAL8;
    let scan_order = tcw.scan_order() && !palettized;
    let stride_sel = tcw.stride_sel() && !palettized;
    let vq_comp = tcw.vq_comp();
    let mip_mapped = tcw.mip_mapped();

    let stride = tex_stride(regs, stride_sel, scan_order, tsp.tex_u(), mip_level);
    let codebook = tcw.tex_addr() << 3;
    let fbpp = bits_per_pixel(vq_comp, pixel_fmt);
    let base = tex_address_gen(vq_comp, tcw);
    let offset = tex_offset_gen(vq_comp, mip_mapped, scan_order, tsp, u, v, stride, mip_level);

    let mut memtel = vram.read_texel64(base + offset * fbpp / 16);
    if vq_comp {
        memtel = vq_lookup(vram, codebook, memtel, offset * fbpp / 16);
    }

    let textel = decode_textel(regs, pixel_fmt, tcw.pal_select(), memtel, offset);
    Color::from_raw(expand_to_argb(textel, expand_format(regs, pixel_fmt)))
}

/// Point or bilinear sampling at a normalized (u, v).
#[allow(clippy::too_many_arguments)]
fn texture_filter(
    regs: Registers,
    vram: &Vram,
    tsp: Tsp,
    tcw: Tcw,
    u: f32,
    v: f32,
    mip_level: u32,
) -> Color {
    let halfpixel: i32 = if regs.half_offset().texure_pixel_half_offset() {
        0
    } else {
        127
    };

    let mip_level = mip_level.min(tsp.tex_u() + 3);

    let (size_u, size_v) = if tcw.mip_mapped() {
        let size = (8i32 << tsp.tex_u()) >> mip_level;
        (size, size)
    } else {
        (8i32 << tsp.tex_u(), 8i32 << tsp.tex_v())
    };

    let ui = (u * size_u as f32 * 256.0) as i32 + halfpixel;
    let vi = (v * size_v as f32 * 256.0) as i32 + halfpixel;

    let pixel_fmt = tcw.pixel_fmt();
    let clamp_u = tsp.clamp_u();
    let clamp_v = tsp.clamp_v();
    let flip_u = tsp.flip_u();
    let flip_v = tsp.flip_v();

    let sample = |du: i32, dv: i32| {
        texture_fetch(
            regs,
            vram,
            tsp,
            tcw,
            pixel_fmt,
            clamp_flip((ui >> 8) + du, size_u, clamp_u, flip_u),
            clamp_flip((vi >> 8) + dv, size_v, clamp_v, flip_v),
            mip_level,
        )
    };

    let mut textel = match tsp.filter_mode() {
        0 => sample(0, 0),
        1 => {
            let s11 = sample(1, 1);
            let s01 = sample(0, 1);
            let s10 = sample(1, 0);
            let s00 = sample(0, 0);

            let ublend = to_u8_256((ui & 255) as u8);
            let vblend = to_u8_256((vi & 255) as u8);
            let nublend = 256 - ublend;
            let nvblend = 256 - vblend;

            let mix = |c11: u8, c01: u8, c10: u8, c00: u8| {
                ((c11 as u32 * ublend * vblend
                    + c01 as u32 * nublend * vblend
                    + c10 as u32 * ublend * nvblend
                    + c00 as u32 * nublend * nvblend)
                    / 65536) as u8
            };

            Color {
                r: mix(s11.r, s01.r, s10.r, s00.r),
                g: mix(s11.g, s01.g, s10.g, s00.g),
                b: mix(s11.b, s01.b, s10.b, s00.b),
                a: mix(s11.a, s01.a, s10.a, s00.a),
            }
        }
        // Trilinear pass A/B: not implemented, fixed sentinel texel.
        _ => Color {
            r: 0x48,
            g: 0x67,
            b: 0xAF,
            a: 0x39,
        },
    };

    if tsp.ignore_tex_a() {
        textel.a = 255;
    }

    textel
}

/// Interpolate a vertex color set, scaling inside an intensity-shadow volume.
#[inline]
fn interpolate_color(
    regs: Registers,
    planes: &[PlaneStepper; 4],
    x: f32,
    y: f32,
    w: f32,
    use_alpha: bool,
    shadow_scaled: bool,
) -> Color {
    let mult = if shadow_scaled {
        to_u8_256(regs.fpu_shad_scale().scale_factor())
    } else {
        256
    };

    let ip = |p: &PlaneStepper| (0.5 + p.ip_u8(x, y, w) as f32 * mult as f32 / 256.0) as u8;

    let mut rv = Color {
        r: ip(&planes[0]),
        g: ip(&planes[1]),
        b: ip(&planes[2]),
        a: ip(&planes[3]),
    };

    if !use_alpha {
        rv.a = 255;
    }

    rv
}

/// Offset (specular) color keeps its alpha unscaled: it doubles as the
/// per-vertex fog coefficient.
#[inline]
fn interpolate_offset(
    regs: Registers,
    planes: &[PlaneStepper; 4],
    x: f32,
    y: f32,
    w: f32,
    shadow_scaled: bool,
) -> Color {
    let mult = if shadow_scaled {
        to_u8_256(regs.fpu_shad_scale().scale_factor())
    } else {
        256
    };

    let ip = |p: &PlaneStepper| (0.5 + p.ip_u8(x, y, w) as f32 * mult as f32 / 256.0) as u8;

    Color {
        r: ip(&planes[0]),
        g: ip(&planes[1]),
        b: ip(&planes[2]),
        a: (0.5 + planes[3].ip_u8(x, y, w) as f32) as u8,
    }
}

/// Combine base, texel and offset colors per the shading instruction.
fn color_combiner(
    base: Color,
    textel: Color,
    offset: Color,
    texture: bool,
    use_offset: bool,
    shad_instr: u32,
) -> Color {
    if !texture {
        return base;
    }

    let mut rv = match shad_instr {
        // Decal: texture replaces.
        0 => textel,
        // Modulate color, texture alpha.
        1 => Color {
            r: (textel.r as u32 * to_u8_256(base.r) / 256) as u8,
            g: (textel.g as u32 * to_u8_256(base.g) / 256) as u8,
            b: (textel.b as u32 * to_u8_256(base.b) / 256) as u8,
            a: textel.a,
        },
        // Decal alpha: blend texture over base by texture alpha.
        2 => {
            let ta = to_u8_256(textel.a);
            let ba = 256 - ta;
            Color {
                r: ((textel.r as u32 * ta + base.r as u32 * ba) / 256) as u8,
                g: ((textel.g as u32 * ta + base.g as u32 * ba) / 256) as u8,
                b: ((textel.b as u32 * ta + base.b as u32 * ba) / 256) as u8,
                a: base.a,
            }
        }
        // Modulate all channels.
        _ => Color {
            r: (textel.r as u32 * to_u8_256(base.r) / 256) as u8,
            g: (textel.g as u32 * to_u8_256(base.g) / 256) as u8,
            b: (textel.b as u32 * to_u8_256(base.b) / 256) as u8,
            a: (textel.a as u32 * to_u8_256(base.a) / 256) as u8,
        },
    };

    if use_offset {
        rv.r = rv.r.saturating_add(offset.r);
        rv.g = rv.g.saturating_add(offset.g);
        rv.b = rv.b.saturating_add(offset.b);
    }

    rv
}

/// Bump-map lighting: the texel carries the surface normal in polar form, the
/// offset color the light direction and coefficients. Produces white with the
/// computed intensity as alpha.
fn bump_mapper(textel: Color, offs: Color) -> Color {
    let k1 = offs.a as i32;
    let k2 = offs.b as i32;
    let k3 = offs.g as i32;
    let q = offs.r;

    let s = textel.g;
    let r = textel.r;

    let i = (k1 * 127 * 127
        + k2 * tex::bm_sin90(s) * 127
        + k3 * tex::bm_cos90(s) * tex::bm_cos360(r.wrapping_sub(q)))
        / 127
        / 127;

    Color {
        r: 255,
        g: 255,
        b: 255,
        a: i.clamp(0, 255) as u8,
    }
}

/// Fog LUT lookup indexed by the exponent and top mantissa bits of
/// density / w, blending each entry's two bytes by the next mantissa bits.
fn lookup_fog_table(regs: Registers, inv_w: f32) -> u8 {
    let density = regs.fog_density();
    let mantissa = ((density >> 8) & 0xFF) as f32 / 128.0;
    let exponent = (density & 0xFF) as u8 as i8;

    let fog_den = mantissa * 2.0f32.powi(exponent as i32);
    let fog_w = (fog_den * inv_w).clamp(1.0, 255.999_985);

    let bits = fog_w.to_bits();
    let m = bits & 0x7F_FFFF;
    let e = (bits >> 23) & 0xFF;

    let index = (((e + 1) & 7) << 4) | ((m >> 19) & 15);
    let blend = ((m >> 11) & 255) as u8;
    let blend_inv = 255 ^ blend;

    let entry = regs.fog_table(index);
    let hi = (entry & 0xFF) as u32;
    let lo = ((entry >> 8) & 0xFF) as u32;

    ((hi * to_u8_256(blend) + lo * to_u8_256(blend_inv)) >> 8) as u8
}

/// Color clamp and fog application.
fn fog_unit(
    regs: Registers,
    use_offset: bool,
    color_clamp: bool,
    fog_ctrl: u32,
    mut col: Color,
    inv_w: f32,
    offs_a: u8,
) -> Color {
    if color_clamp {
        let max = Color::from_raw(regs.fog_clamp_max());
        let min = Color::from_raw(regs.fog_clamp_min());
        col.r = col.r.clamp(min.r, max.r);
        col.g = col.g.clamp(min.g, max.g);
        col.b = col.b.clamp(min.b, max.b);
        col.a = col.a.clamp(min.a, max.a);
    }

    match fog_ctrl {
        // Lookup-table fog: blend toward (or replace with) FOG_COL_RAM.
        0b00 | 0b11 => {
            let fog_alpha = lookup_fog_table(regs, inv_w);
            let fog_inv = 255 ^ fog_alpha;
            let col_ram = Color::from_raw(regs.fog_col_ram());

            if fog_ctrl == 0b00 {
                let mix = |c: u8, f: u8| {
                    ((c as u32 * to_u8_256(fog_inv) + f as u32 * to_u8_256(fog_alpha)) >> 8) as u8
                };
                col.r = mix(col.r, col_ram.r);
                col.g = mix(col.g, col_ram.g);
                col.b = mix(col.b, col_ram.b);
            } else {
                col.r = col_ram.r;
                col.g = col_ram.g;
                col.b = col_ram.b;
                col.a = fog_alpha;
            }
        }
        // Per-vertex fog: offset alpha blends toward FOG_COL_VERT.
        0b01 => {
            if use_offset {
                let col_vert = Color::from_raw(regs.fog_col_vert());
                let inv = 255 ^ offs_a;
                let mix = |c: u8, f: u8| {
                    ((c as u32 * to_u8_256(inv) + f as u32 * to_u8_256(offs_a)) >> 8) as u8
                };
                col.r = mix(col.r, col_vert.r);
                col.g = mix(col.g, col_vert.g);
                col.b = mix(col.b, col_vert.b);
            }
        }
        // No fog.
        _ => {}
    }

    col
}

/// Source/destination blend factor selection.
fn blend_coefs(src: Color, dst: Color, instr: u32, other_is_src: bool) -> Color {
    let mut rv = match instr >> 1 {
        0 => Color::default(),
        1 => {
            if other_is_src {
                src
            } else {
                dst
            }
        }
        2 => Color {
            r: src.a,
            g: src.a,
            b: src.a,
            a: src.a,
        },
        _ => Color {
            r: dst.a,
            g: dst.a,
            b: dst.a,
            a: dst.a,
        },
    };

    if instr & 1 != 0 {
        rv.r = 255 - rv.r;
        rv.g = 255 - rv.g;
        rv.b = 255 - rv.b;
        rv.a = 255 - rv.a;
    }

    rv
}

/// Blend the shaded color into the selected accumulator. Returns false when
/// the punch-through alpha test rejects the pixel.
#[allow(clippy::too_many_arguments)]
fn blending_unit(
    regs: Registers,
    tile: &mut TileBuffers,
    index: usize,
    col: Color,
    tsp: Tsp,
    alpha_test: bool,
) -> bool {
    let mut final_col = col;
    if alpha_test {
        if (col.a as u32) < regs.pt_alpha_ref() & 0xFF {
            // Z-hole: nothing reaches the accumulator, the caller reopens
            // the pixel for the next peel iteration.
            return false;
        }
        final_col.a = 255;
    }

    let src = if tsp.src_select() {
        Color::from_raw(tile.accum[ACCUM_AUX][index])
    } else {
        final_col
    };

    let dst = if tsp.dst_select() {
        Color::from_raw(tile.accum[ACCUM_AUX][index])
    } else {
        Color::from_raw(tile.accum[ACCUM_OUT][index])
    };

    let src_coef = blend_coefs(src, dst, tsp.src_instr(), false);
    let dst_coef = blend_coefs(src, dst, tsp.dst_instr(), true);

    let mix = |s: u8, sc: u8, d: u8, dc: u8| {
        (((s as u32 * to_u8_256(sc) + d as u32 * to_u8_256(dc)) >> 8).min(255)) as u8
    };

    let rv = Color {
        r: mix(src.r, src_coef.r, dst.r, dst_coef.r),
        g: mix(src.g, src_coef.g, dst.g, dst_coef.g),
        b: mix(src.b, src_coef.b, dst.b, dst_coef.b),
        a: mix(src.a, src_coef.a, dst.a, dst_coef.a),
    };

    let target = if tsp.dst_select() { ACCUM_AUX } else { ACCUM_OUT };
    tile.accum[target][index] = rv.to_raw();

    true
}

/// Full pixel pipeline for one tagged pixel: interpolate, sample, combine,
/// fog, blend. Returns the punch-through alpha test verdict.
#[allow(clippy::too_many_arguments)]
pub fn pixel_flush_tsp(
    regs: Registers,
    vram: &Vram,
    tile: &mut TileBuffers,
    entry: &FpuEntry,
    alpha_test: bool,
    x: f32,
    y: f32,
    index: usize,
    inv_w: f32,
    in_volume: bool,
) -> bool {
    let cheap_shadows = regs.fpu_shad_scale().intensity_shadow();
    let shadow_scaled = cheap_shadows && in_volume;
    let vol = usize::from(in_volume && !cheap_shadows);

    let tsp = entry.params.tsp[vol];
    let tcw = entry.params.tcw[vol];
    let textured = entry.params.isp.texture();
    let use_offset = entry.params.isp.offset();
    let w = 1.0 / inv_w;

    let base = interpolate_color(
        regs,
        &entry.ips.col[vol],
        x,
        y,
        w,
        tsp.use_alpha(),
        shadow_scaled,
    );

    let offs = if use_offset {
        interpolate_offset(regs, &entry.ips.ofs[vol], x, y, w, shadow_scaled)
    } else {
        OFFS_DEFAULT
    };

    let mut textel = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    if textured {
        let u = entry.ips.u[vol].ip(x, y) * w;
        let v = entry.ips.v[vol].ip(x, y) * w;

        // Approximate mip selection from the UV plane gradients; the
        // hardware derives this from adjacent-pixel deltas instead.
        let mut mip_level = 0u32;
        if tcw.mip_mapped() {
            let size_u = 8 << tsp.tex_u();
            let ddx = entry.ips.u[vol].ddx + entry.ips.v[vol].ddx;
            let ddy = entry.ips.u[vol].ddy + entry.ips.v[vol].ddy;

            let mut d =
                ddx.abs().min(ddy.abs()) * w * size_u as f32 * tsp.mip_map_d() as f32 / 4.0;
            while d > 1.5 && mip_level < 11 {
                mip_level += 1;
                d /= 2.0;
            }
        }

        textel = texture_filter(regs, vram, tsp, tcw, u, v, mip_level);
    }

    let col = if textured && tcw.pixel_fmt() == PIXEL_BUMPMAP {
        bump_mapper(textel, offs)
    } else {
        color_combiner(base, textel, offs, textured, use_offset, tsp.shad_instr())
    };

    let col = fog_unit(
        regs,
        use_offset,
        tsp.color_clamp(),
        tsp.fog_ctrl(),
        col,
        inv_w,
        offs.a,
    );

    blending_unit(regs, tile, index, col, tsp, alpha_test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_round_trips_raw_word() {
        let c = Color::from_raw(0x8040_20FF);
        assert_eq!((c.r, c.g, c.b, c.a), (0xFF, 0x20, 0x40, 0x80));
        assert_eq!(c.to_raw(), 0x8040_20FF);
    }

    #[test]
    fn combiner_modulate_scales_by_base() {
        let base = Color {
            r: 128,
            g: 255,
            b: 0,
            a: 77,
        };
        let textel = Color {
            r: 255,
            g: 255,
            b: 255,
            a: 9,
        };
        let out = color_combiner(base, textel, Color::default(), true, false, 1);
        assert_eq!((out.r, out.g, out.b), (128, 255, 0));
        // Shading instruction 1 takes the texture alpha.
        assert_eq!(out.a, 9);
    }

    #[test]
    fn combiner_decal_ignores_base() {
        let base = Color {
            r: 1,
            g: 2,
            b: 3,
            a: 4,
        };
        let textel = Color {
            r: 50,
            g: 60,
            b: 70,
            a: 80,
        };
        assert_eq!(
            color_combiner(base, textel, Color::default(), true, false, 0),
            textel
        );
    }

    #[test]
    fn combiner_untextured_passes_base() {
        let base = Color {
            r: 10,
            g: 20,
            b: 30,
            a: 40,
        };
        assert_eq!(
            color_combiner(base, Color::default(), Color::default(), false, true, 3),
            base
        );
    }

    #[test]
    fn blend_coefs_cover_all_factors() {
        let src = Color {
            r: 10,
            g: 20,
            b: 30,
            a: 40,
        };
        let dst = Color {
            r: 50,
            g: 60,
            b: 70,
            a: 80,
        };

        // 0: zero, 1: one.
        assert_eq!(blend_coefs(src, dst, 0, false), Color::default());
        assert_eq!(blend_coefs(src, dst, 1, false).r, 255);
        // 2/3: other color and inverse (dst is "other" for the source side).
        assert_eq!(blend_coefs(src, dst, 2, false).r, 50);
        assert_eq!(blend_coefs(src, dst, 3, false).r, 205);
        // 4/5: source alpha.
        assert_eq!(blend_coefs(src, dst, 4, false).g, 40);
        assert_eq!(blend_coefs(src, dst, 5, false).g, 215);
        // 6/7: destination alpha.
        assert_eq!(blend_coefs(src, dst, 6, false).b, 80);
        assert_eq!(blend_coefs(src, dst, 7, false).b, 175);
    }

    #[test]
    fn bump_mapper_full_elevation_is_flat_white() {
        // k1 only: intensity equals k1 regardless of the normal.
        let offs = Color {
            r: 0,
            g: 0,
            b: 0,
            a: 200,
        };
        let textel = Color {
            r: 13,
            g: 37,
            b: 0,
            a: 0,
        };
        let out = bump_mapper(textel, offs);
        assert_eq!((out.r, out.g, out.b), (255, 255, 255));
        assert_eq!(out.a, 200);
    }
}
