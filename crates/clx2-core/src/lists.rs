// Region array and object list decoding.
//
// The region array is a flag-terminated list of tile descriptors; each entry
// points at up to five object lists (opaque, opaque modifier, translucent,
// translucent modifier, punch-through). Object lists are inline linked lists
// of 32-bit entries: triangle strips, triangle arrays, quad arrays and links.

use crate::regs::Registers;
use crate::render::Renderer;
use crate::tile::{rasterize_triangle, TileRect};
use crate::types::{DrawParameters, ParamTag, RenderMode, Vertex};
use crate::vram::Vram;
use crate::RenderError;
use bitfield::bitfield;

/// Upper bound on entries walked per object list. The 32-bit-view address
/// space cannot hold more distinct entries, so exceeding it means the list
/// links back into itself.
const MAX_LIST_ENTRIES: u32 = 1 << 21;

bitfield! {
    #[derive(Copy, Clone)]
    pub struct RegionArrayControl(u32);
    impl Debug;

    pub tilex, set_tilex: 7, 2;
    pub tiley, set_tiley: 13, 8;
    pub no_writeout, set_no_writeout: 28;
    pub pre_sort, set_pre_sort: 29;
    pub z_keep, set_z_keep: 30;
    pub last_region, set_last_region: 31;
}

bitfield! {
    /// Object list pointer of a region array entry.
    #[derive(Copy, Clone)]
    pub struct ListPointer(u32);
    impl Debug;

    pub ptr_in_words, set_ptr_in_words: 23, 2;
    pub empty, set_empty: 31;
}

bitfield! {
    /// Triangle strip object entry (bit 31 clear).
    #[derive(Copy, Clone)]
    pub struct ObjectTstrip(u32);
    impl Debug;

    pub param_offs_in_words, set_param_offs_in_words: 20, 0;
    pub skip, set_skip: 23, 21;
    pub shadow, set_shadow: 24;
    pub mask, set_mask: 30, 25;
    pub is_not_triangle_strip, set_is_not_triangle_strip: 31;
}

bitfield! {
    /// Triangle or quad array object entry (types 0b100 / 0b101).
    #[derive(Copy, Clone)]
    pub struct ObjectArray(u32);
    impl Debug;

    pub param_offs_in_words, set_param_offs_in_words: 20, 0;
    pub skip, set_skip: 23, 21;
    pub shadow, set_shadow: 24;
    pub prims, set_prims: 28, 25;
    pub obj_type, set_obj_type: 31, 29;
}

bitfield! {
    /// List link entry (type 0b111).
    #[derive(Copy, Clone)]
    pub struct ObjectLink(u32);
    impl Debug;

    pub next_block_ptr_in_words, set_next_block_ptr_in_words: 23, 2;
    pub end_of_list, set_end_of_list: 28;
    pub obj_type, set_obj_type: 31, 29;
}

/// One raw object list word, viewable as any of the entry formats.
#[derive(Copy, Clone)]
pub struct ObjectListEntry(pub u32);

impl ObjectListEntry {
    #[inline]
    pub fn is_triangle_strip(&self) -> bool {
        self.0 >> 31 == 0
    }

    #[inline]
    pub fn obj_type(&self) -> u32 {
        (self.0 >> 29) & 0b111
    }

    #[inline]
    pub fn tstrip(&self) -> ObjectTstrip {
        ObjectTstrip(self.0)
    }

    #[inline]
    pub fn array(&self) -> ObjectArray {
        ObjectArray(self.0)
    }

    #[inline]
    pub fn link(&self) -> ObjectLink {
        ObjectLink(self.0)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct RegionArrayEntry {
    pub control: RegionArrayControl,
    pub opaque: ListPointer,
    pub opaque_mod: ListPointer,
    pub trans: ListPointer,
    pub trans_mod: ListPointer,
    pub puncht: ListPointer,
}

/// Read one region array entry, returning it and its byte size. The 5-word
/// format has no punch-through pointer (synthesized empty) and takes its
/// pre-sort flag from ISP_FEED_CFG instead of the control word.
pub fn read_region_array_entry(vram: &Vram, regs: Registers, base: u32) -> (RegionArrayEntry, u32) {
    let fmt_v1 = !regs.fpu_param_cfg().region_header_type();

    let mut entry = RegionArrayEntry {
        control: RegionArrayControl(vram.read32(base)),
        opaque: ListPointer(vram.read32(base + 4)),
        opaque_mod: ListPointer(vram.read32(base + 8)),
        trans: ListPointer(vram.read32(base + 12)),
        trans_mod: ListPointer(vram.read32(base + 16)),
        puncht: ListPointer(0x8000_0000),
    };

    if fmt_v1 {
        entry
            .control
            .set_pre_sort(regs.isp_feed_cfg().pre_sort());
        (entry, 5 * 4)
    } else {
        entry.puncht = ListPointer(vram.read32(base + 20));
        (entry, 6 * 4)
    }
}

#[inline]
fn f16(v: u16) -> f32 {
    // PVR 16-bit UVs are the upper half of an f32, not IEEE half floats.
    f32::from_bits((v as u32) << 16)
}

#[inline]
fn unpack_color(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

/// Byte stride of one vertex for a given skip/volume configuration.
#[inline]
fn vertex_stride(skip: u32, two_volumes: bool) -> u32 {
    (3 + skip * if two_volumes { 2 } else { 1 }) * 4
}

/// Decode one vertex at `ptr` in the layout selected by the parameter block.
fn decode_vertex(vram: &Vram, params: &DrawParameters, mut ptr: u32, two_volumes: bool) -> Vertex {
    let mut cv = Vertex::default();

    cv.x = vram.read_f32(ptr);
    cv.y = vram.read_f32(ptr + 4);
    cv.z = vram.read_f32(ptr + 8);
    ptr += 12;

    if params.isp.texture() {
        if params.isp.uv_16b() {
            let uv = vram.read32(ptr);
            cv.u = f16((uv >> 16) as u16);
            cv.v = f16(uv as u16);
            ptr += 4;
        } else {
            cv.u = vram.read_f32(ptr);
            cv.v = vram.read_f32(ptr + 4);
            ptr += 8;
        }
    }

    cv.col = unpack_color(vram.read32(ptr));
    ptr += 4;

    if params.isp.offset() {
        cv.spc = unpack_color(vram.read32(ptr));
        ptr += 4;
    }

    if two_volumes {
        if params.isp.texture() {
            if params.isp.uv_16b() {
                let uv = vram.read32(ptr);
                cv.u1 = f16((uv >> 16) as u16);
                cv.v1 = f16(uv as u16);
                ptr += 4;
            } else {
                cv.u1 = vram.read_f32(ptr);
                cv.v1 = vram.read_f32(ptr + 4);
                ptr += 8;
            }
        }

        cv.col1 = unpack_color(vram.read32(ptr));
        ptr += 4;

        if params.isp.offset() {
            cv.spc1 = unpack_color(vram.read32(ptr));
        }
    }

    cv
}

/// Decode a parameter block: the instruction words, then `vtx.len()` vertices
/// starting `offset` vertices into the block. Returns the read pointer past
/// the last decoded vertex.
pub fn decode_param_block(
    vram: &Vram,
    params: &mut DrawParameters,
    mut base: u32,
    skip: u32,
    two_volumes: bool,
    vtx: &mut [Vertex],
    offset: u32,
) -> u32 {
    params.isp.set_full(vram.read32(base));
    params.tsp[0].set_full(vram.read32(base + 4));
    params.tcw[0].set_full(vram.read32(base + 8));
    base += 12;

    if two_volumes {
        params.tsp[1].set_full(vram.read32(base));
        params.tcw[1].set_full(vram.read32(base + 4));
        base += 8;
    }

    base += offset * vertex_stride(skip, two_volumes);

    for v in vtx.iter_mut() {
        *v = decode_vertex(vram, params, base, two_volumes);
        base += vertex_stride(skip, two_volumes);
    }

    base
}

impl Renderer<'_, '_, '_> {
    fn two_volumes(&self, shadow: bool) -> bool {
        shadow && !self.regs.fpu_shad_scale().intensity_shadow()
    }

    /// Rasterize one triangle (or quad), then run the per-primitive follow-up
    /// the render mode demands: presort primitives shade immediately, and a
    /// modifier volume boundary folds the stencil it just wrote.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render_triangle(
        &mut self,
        render_mode: RenderMode,
        params: &DrawParameters,
        tag: ParamTag,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
        v4: Option<&Vertex>,
        rect: &TileRect,
    ) {
        rasterize_triangle(self.regs, self.tile, render_mode, params, tag, v1, v2, v3, v4, rect);

        if render_mode == RenderMode::TranslucentPresort {
            self.render_param_tags(RenderMode::TranslucentPresort, rect);
        }

        if render_mode == RenderMode::Modifier {
            match params.isp.volume_mode() {
                1 => self.tile.summarize_stencil_or(),
                2 => self.tile.summarize_stencil_and(),
                _ => {}
            }
        }
    }

    /// Triangle strip entry: up to 8 vertices, a 6-bit mask consumed MSB
    /// first, odd triangles swapping their leading vertices to keep the
    /// strip's winding.
    fn render_triangle_strip(
        &mut self,
        render_mode: RenderMode,
        obj: ObjectTstrip,
        rect: &TileRect,
    ) {
        let param_base = self.regs.param_base() & 0xF0_0000;
        let block_addr = param_base + obj.param_offs_in_words() * 4;
        let two_volumes = self.two_volumes(obj.shadow());

        let mut params = DrawParameters::default();
        let mut vtx = [Vertex::default(); 8];
        decode_param_block(
            &self.vram,
            &mut params,
            block_addr,
            obj.skip(),
            two_volumes,
            &mut vtx,
            0,
        );

        for i in 0..6u32 {
            if obj.mask() & (1 << (5 - i)) == 0 {
                continue;
            }

            let tag = ParamTag::from_desc(
                params.isp.cache_bypass(),
                obj.shadow(),
                obj.skip(),
                obj.param_offs_in_words(),
                i,
            );

            let odd = (i & 1) as usize;
            let even = odd ^ 1;
            let i = i as usize;

            self.render_triangle(
                render_mode,
                &params,
                tag,
                &vtx[i + odd],
                &vtx[i + even],
                &vtx[i + 2],
                None,
                rect,
            );
        }
    }

    /// Triangle array entry: `prims + 1` primitives, each with its own
    /// parameter block of three vertices.
    fn render_triangle_array(&mut self, render_mode: RenderMode, obj: ObjectArray, rect: &TileRect) {
        let param_base = self.regs.param_base() & 0xF0_0000;
        let two_volumes = self.two_volumes(obj.shadow());
        let mut param_ptr = param_base + obj.param_offs_in_words() * 4;

        for _ in 0..obj.prims() + 1 {
            let mut params = DrawParameters::default();
            let mut vtx = [Vertex::default(); 3];

            let block_addr = param_ptr;
            param_ptr = decode_param_block(
                &self.vram,
                &mut params,
                block_addr,
                obj.skip(),
                two_volumes,
                &mut vtx,
                0,
            );

            let tag = ParamTag::from_desc(
                params.isp.cache_bypass(),
                obj.shadow(),
                obj.skip(),
                (block_addr - param_base) / 4,
                0,
            );

            self.render_triangle(render_mode, &params, tag, &vtx[0], &vtx[1], &vtx[2], None, rect);
        }
    }

    /// Quad array entry: like a triangle array but the fourth vertex rides
    /// along for bilinear quad rasterization.
    fn render_quad_array(&mut self, render_mode: RenderMode, obj: ObjectArray, rect: &TileRect) {
        let param_base = self.regs.param_base() & 0xF0_0000;
        let two_volumes = self.two_volumes(obj.shadow());
        let mut param_ptr = param_base + obj.param_offs_in_words() * 4;

        for _ in 0..obj.prims() + 1 {
            let mut params = DrawParameters::default();
            let mut vtx = [Vertex::default(); 4];

            let block_addr = param_ptr;
            param_ptr = decode_param_block(
                &self.vram,
                &mut params,
                block_addr,
                obj.skip(),
                two_volumes,
                &mut vtx,
                0,
            );

            let tag = ParamTag::from_desc(
                params.isp.cache_bypass(),
                obj.shadow(),
                obj.skip(),
                (block_addr - param_base) / 4,
                0,
            );

            self.render_triangle(
                render_mode,
                &params,
                tag,
                &vtx[0],
                &vtx[1],
                &vtx[2],
                Some(&vtx[3]),
                rect,
            );
        }
    }

    /// Walk one object list, following links until an end-of-list link.
    /// Unknown entry types are reported and skipped.
    pub(crate) fn render_object_list(
        &mut self,
        render_mode: RenderMode,
        mut base: u32,
        rect: &TileRect,
    ) -> Result<(), RenderError> {
        for _ in 0..MAX_LIST_ENTRIES {
            let obj = ObjectListEntry(self.vram.read32(base));
            base += 4;

            if obj.is_triangle_strip() {
                self.render_triangle_strip(render_mode, obj.tstrip(), rect);
            } else {
                match obj.obj_type() {
                    0b111 => {
                        let link = obj.link();
                        if link.end_of_list() {
                            return Ok(());
                        }
                        base = link.next_block_ptr_in_words() * 4;
                    }
                    0b100 => self.render_triangle_array(render_mode, obj.array(), rect),
                    0b101 => self.render_quad_array(render_mode, obj.array(), rect),
                    t => {
                        log::warn!("object list {base:#010X}: unhandled entry type {t}, skipped");
                    }
                }
            }
        }

        Err(RenderError::MalformedList("object list does not terminate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_entry_views() {
        // Triangle strip: offset 0x100 words, skip 3, mask 0b101010.
        let e = ObjectListEntry(0x100 | (3 << 21) | (0b101010 << 25));
        assert!(e.is_triangle_strip());
        assert_eq!(e.tstrip().param_offs_in_words(), 0x100);
        assert_eq!(e.tstrip().skip(), 3);
        assert_eq!(e.tstrip().mask(), 0b101010);

        // Quad array with two primitives.
        let e = ObjectListEntry((0b101 << 29) | (1 << 25) | 0x40);
        assert!(!e.is_triangle_strip());
        assert_eq!(e.obj_type(), 0b101);
        assert_eq!(e.array().prims(), 1);

        // End-of-list link.
        let e = ObjectListEntry((0b111 << 29) | (1 << 28));
        assert_eq!(e.obj_type(), 0b111);
        assert!(e.link().end_of_list());
    }

    #[test]
    fn vertex_stride_covers_all_sizes() {
        assert_eq!(vertex_stride(0, false), 12);
        assert_eq!(vertex_stride(1, false), 16);
        assert_eq!(vertex_stride(7, false), 40);
        assert_eq!(vertex_stride(3, true), 36);
    }

    #[test]
    fn f16_is_upper_half_float() {
        assert_eq!(f16(0x3F80), 1.0);
        assert_eq!(f16(0x4000), 2.0);
        assert_eq!(f16(0xBF80), -1.0);
    }
}
