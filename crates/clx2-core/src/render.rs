// Pass driver: walks the region array and, per tile, runs the opaque,
// punch-through and translucent phases over the tile buffers, then packs the
// accumulator out to VRAM.

use crate::lists::read_region_array_entry;
use crate::regs::Registers;
use crate::tile::{
    FpuCache, TileBuffers, TileRect, ACCUM_OUT, DEPTH_SAVE, DEPTH_TEST, TAG_CURRENT, TILE_SIZE,
};
use crate::tsp::{pixel_flush_tsp, Color};
use crate::types::{ParamTag, RenderMode};
use crate::vram::Vram;
use crate::RenderError;

/// Region arrays beyond this length have lost their terminator.
const MAX_REGION_ENTRIES: u32 = 1024;

/// Bayer threshold biases for the 4x4 ordered dither of the 565 pack,
/// indexed by (y & 3, x & 3).
const BAYER_BIAS: [[u8; 4]; 4] = [
    [8, 136, 40, 168],
    [200, 72, 232, 104],
    [56, 184, 24, 152],
    [248, 120, 216, 88],
];

/// Quantize one 8-bit channel to `max` levels under the dither threshold.
#[inline]
fn dither_channel(c8: u8, max: u32, threshold: u8) -> u32 {
    ((c8 as u32 * max + threshold as u32) / 255).min(max)
}

/// Pack one accumulator word as dithered RGB565.
#[inline]
pub fn pack_565_dithered(raw: u32, x: usize, y: usize) -> u16 {
    let c = Color::from_raw(raw);
    let t = BAYER_BIAS[y & 3][x & 3];

    let r5 = dither_channel(c.r, 31, t);
    let g6 = dither_channel(c.g, 63, t);
    let b5 = dither_channel(c.b, 31, t);

    (r5 | (g6 << 5) | (b5 << 11)) as u16
}

pub(crate) struct Renderer<'t, 'v, 'r> {
    pub vram: Vram<'v>,
    pub regs: Registers<'r>,
    pub tile: &'t mut TileBuffers,
    pub fpu: &'t mut FpuCache,
}

impl Renderer<'_, '_, '_> {
    /// Check the register configuration against what the core supports.
    /// Anything else aborts the frame before a single tile renders.
    fn validate_config(&self) -> Result<(), RenderError> {
        let scaler = self.regs.scaler_ctl();
        let vscale = scaler.vscalefactor();
        if scaler.hscale() || scaler.interlace() || !matches!(vscale, 0x400 | 0x401 | 0x800) {
            return Err(RenderError::ConfigurationUnsupported {
                register: "SCALER_CTL",
                value: scaler.0,
            });
        }

        let fb_w_ctrl = self.regs.fb_w_ctrl();
        if !matches!(fb_w_ctrl.fb_packmode(), 1 | 6) {
            return Err(RenderError::ConfigurationUnsupported {
                register: "FB_W_CTRL",
                value: fb_w_ctrl.0,
            });
        }

        Ok(())
    }

    /// Render one frame from the region array.
    pub fn render_core(&mut self) -> Result<(), RenderError> {
        self.validate_config()?;

        let mut base = self.regs.region_base();
        let bg_tag = self.regs.isp_backgnd_t();
        let bg_depth = self.regs.isp_backgnd_d();
        let border = self.regs.vo_border_col();
        let border_color = Color {
            r: border.red(),
            g: border.green(),
            b: border.blue(),
            a: 0,
        }
        .to_raw();

        for _ in 0..MAX_REGION_ENTRIES {
            let (entry, step) = read_region_array_entry(&self.vram, self.regs, base);
            base += step;

            let rect = TileRect {
                left: entry.control.tilex() as i32 * TILE_SIZE as i32,
                top: entry.control.tiley() as i32 * TILE_SIZE as i32,
                right: entry.control.tilex() as i32 * TILE_SIZE as i32 + TILE_SIZE as i32,
                bottom: entry.control.tiley() as i32 * TILE_SIZE as i32 + TILE_SIZE as i32,
            };

            self.fpu.reset();

            if !entry.control.z_keep() {
                self.tile.clear(bg_tag.full(), bg_depth, border_color);
            } else {
                self.tile.clear_status();
            }

            // Opaque phase: depth-first tag pass, modifier stenciling, then
            // one shading sweep (the background plane shades here too).
            if !entry.opaque.empty() {
                self.render_object_list(RenderMode::Opaque, entry.opaque.ptr_in_words() * 4, &rect)?;

                if !entry.opaque_mod.empty() {
                    self.render_object_list(
                        RenderMode::Modifier,
                        entry.opaque_mod.ptr_in_words() * 4,
                        &rect,
                    )?;
                }
            }

            self.render_param_tags(RenderMode::Opaque, &rect);

            // Punch-through phase: iterative peel with alpha-test feedback.
            if !entry.puncht.empty() {
                self.tile.peel_punchthrough_initial();
                self.tile.more_to_draw = false;

                self.render_object_list(
                    RenderMode::PunchthroughPass0,
                    entry.puncht.ptr_in_words() * 4,
                    &rect,
                )?;
                self.tile.peel_punchthrough();
                self.render_param_tags(RenderMode::PunchthroughPass0, &rect);

                while self.tile.more_to_draw {
                    self.tile.more_to_draw = false;

                    self.render_object_list(
                        RenderMode::PunchthroughPassN,
                        entry.puncht.ptr_in_words() * 4,
                        &rect,
                    )?;

                    if !self.tile.more_to_draw {
                        break;
                    }

                    self.tile.more_to_draw = false;
                    self.tile.peel_punchthrough();
                    self.render_param_tags(RenderMode::PunchthroughPass0, &rect);
                }

                // Punch-through modifiers ride the opaque modifier list.
                if !entry.opaque_mod.empty() {
                    self.render_object_list(
                        RenderMode::Modifier,
                        entry.opaque_mod.ptr_in_words() * 4,
                        &rect,
                    )?;
                    self.render_param_tags(RenderMode::PunchthroughMv, &rect);
                }
            }

            // Translucent phase: painter's order when presorted, otherwise
            // depth peeling back to front.
            if !entry.trans.empty() {
                if entry.control.pre_sort() {
                    self.tile.clear_status();
                    self.render_object_list(
                        RenderMode::TranslucentPresort,
                        entry.trans.ptr_in_words() * 4,
                        &rect,
                    )?;
                } else {
                    self.tile.set_tag_to_max();
                    loop {
                        self.tile.more_to_draw = false;
                        self.tile.peel_translucent();

                        self.render_object_list(
                            RenderMode::TranslucentAutosort,
                            entry.trans.ptr_in_words() * 4,
                            &rect,
                        )?;

                        if !entry.trans_mod.empty() {
                            self.render_object_list(
                                RenderMode::Modifier,
                                entry.trans_mod.ptr_in_words() * 4,
                                &rect,
                            )?;
                        }

                        self.render_param_tags(RenderMode::TranslucentAutosort, &rect);

                        if !self.tile.more_to_draw {
                            break;
                        }
                    }
                }
            }

            if !entry.control.no_writeout() {
                self.writeback(entry.control.tilex(), entry.control.tiley());
            }

            if entry.control.last_region() {
                return Ok(());
            }
        }

        Err(RenderError::MalformedList("region array does not terminate"))
    }

    /// Shade every pixel whose tag awaits this pass: resolve the tag through
    /// the FPU cache and run the TSP pipeline. Punch-through passes feed the
    /// alpha-test verdict back into the depth and status buffers.
    pub(crate) fn render_param_tags(&mut self, render_mode: RenderMode, rect: &TileRect) {
        let halfpixel = if self.regs.half_offset().tsp_pixel_half_offset() {
            0.5
        } else {
            0.0
        };

        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let index = y * TILE_SIZE + x;
                let tag = ParamTag(self.tile.tag[TAG_CURRENT][index]);
                let in_volume = self.tile.in_volume(index) && tag.shadow();

                let tag_valid = match render_mode {
                    // The modifier re-shade only touches committed
                    // punch-through pixels inside the volume.
                    RenderMode::PunchthroughMv => {
                        if !in_volume {
                            continue;
                        }
                        self.tile.status[index].rendered
                    }
                    _ => self.tile.status[index].valid,
                };

                if !tag_valid {
                    continue;
                }

                let entry = self.fpu.entry(&self.vram, self.regs, rect, tag);
                let px = x as f32 + halfpixel;
                let py = y as f32 + halfpixel;
                let inv_w = entry.ips.inv_w.ip(px, py);

                let alpha_passed = pixel_flush_tsp(
                    self.regs,
                    &self.vram,
                    self.tile,
                    entry,
                    render_mode.alpha_tests(),
                    px,
                    py,
                    index,
                    inv_w,
                    in_volume,
                );

                if render_mode.alpha_tests() {
                    if !alpha_passed {
                        // Alpha-test hole: reopen the pixel so the next peel
                        // can fill it from behind.
                        self.tile.more_to_draw = true;
                        self.tile.depth[DEPTH_TEST][index] = self.tile.depth[DEPTH_SAVE][index];
                    } else {
                        self.tile.status[index].rendered = true;
                        self.tile.status[index].valid = false;
                    }
                }

                if render_mode == RenderMode::TranslucentPresort {
                    self.tile.status[index].valid = false;
                }
            }
        }
    }

    /// Pack the tile accumulator into the write framebuffer, 565 with Bayer
    /// dithering or straight 8888.
    fn writeback(&mut self, tilex: u32, tiley: u32) {
        let scaler = self.regs.scaler_ctl();
        let base = if scaler.interlace() && scaler.fieldselect() {
            self.regs.fb_w_sof2()
        } else {
            self.regs.fb_w_sof1()
        };

        let packmode = self.regs.fb_w_ctrl().fb_packmode();
        let bpp: u32 = if packmode == 1 { 2 } else { 4 };
        let line_bytes = self.regs.fb_w_linestride().stride() * 8;
        let offset_bytes = tilex * TILE_SIZE as u32 * bpp + tiley * TILE_SIZE as u32 * line_bytes;

        for y in 0..TILE_SIZE {
            let mut dst = base + offset_bytes + y as u32 * line_bytes;

            for x in 0..TILE_SIZE {
                let raw = self.tile.accum[ACCUM_OUT][y * TILE_SIZE + x];

                if packmode == 1 {
                    self.vram.write16(dst, pack_565_dithered(raw, x, y));
                } else {
                    self.vram.write32(dst, raw);
                }

                dst += bpp;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dither_stays_in_field_range() {
        for y in 0..4usize {
            for x in 0..4usize {
                for c in (0..=255u32).step_by(5) {
                    let raw = c | (c << 8) | (c << 16);
                    let packed = pack_565_dithered(raw, x, y) as u32;
                    assert!(packed & 0x1F <= 31);
                    assert!((packed >> 5) & 0x3F <= 63);
                    assert!((packed >> 11) & 0x1F <= 31);
                }
            }
        }
        // Saturated white must hit the top of every field at any threshold.
        for y in 0..4usize {
            for x in 0..4usize {
                assert_eq!(pack_565_dithered(0x00FF_FFFF, x, y), 0xFFFF);
            }
        }
    }

    #[test]
    fn dither_rounds_up_past_threshold() {
        // 128/255 of 31 is 15.6: the low thresholds keep 15, high push to 16.
        let raw = 0x0000_0080;
        assert_eq!(pack_565_dithered(raw, 0, 0) & 0x1F, 15);
        assert_eq!(pack_565_dithered(raw, 3, 3) & 0x1F, 15);
        assert_eq!(pack_565_dithered(raw, 0, 3) & 0x1F, 16);
    }
}
