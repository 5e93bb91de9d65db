//! Reference-style software rasterizer for the CLX2 tile-based deferred
//! renderer.
//!
//! The core consumes display lists already built in VRAM (the region array
//! and its object lists) together with the rendering register block, and
//! writes framebuffer pixels back into VRAM. Per 32x32 tile it runs the
//! opaque, punch-through and translucent phases over internal depth, stencil,
//! tag and color buffers, resolves per-pixel parameter tags through a small
//! FPU cache, and packs the result out as RGB565 (Bayer-dithered) or
//! ARGB8888.
//!
//! The tile accelerator that builds the lists, video scan-out and host
//! integration live elsewhere; this crate only renders.

mod render;
mod tex;
mod tile;
mod tsp;

pub mod lists;
pub mod regs;
pub mod types;
pub mod vram;

pub use regs::{Registers, REG_SIZE, REG_WORDS};
pub use vram::{pvr_map32, Vram, VRAM_SIZE};

use render::Renderer;
use tile::{FpuCache, TileBuffers};

/// Frame-aborting failures. Out-of-range VRAM accesses are masked and logged,
/// and degenerate primitives are skipped, without surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A register holds a combination the core does not implement.
    #[error("unsupported {register} configuration: {value:#010X}")]
    ConfigurationUnsupported { register: &'static str, value: u32 },

    /// A display list structure cannot be walked to completion.
    #[error("malformed display list: {0}")]
    MalformedList(&'static str),
}

/// Populate the process-wide detwiddle and bump-map tables. Optional: they
/// also build lazily on first use.
pub fn init() {
    tex::init_tables();
}

/// Rasterizer state that survives across frames: the per-tile working
/// buffers and the FPU parameter cache. Both are reset per tile; keeping the
/// allocation around just spares the host re-zeroing it every frame.
pub struct Core {
    tile: TileBuffers,
    fpu: FpuCache,
}

impl Core {
    pub fn new() -> Self {
        Self {
            tile: TileBuffers::new(),
            fpu: FpuCache::new(),
        }
    }

    /// Render one frame: walk the region array until its terminating entry,
    /// rendering and writing back every tile. VRAM is borrowed mutably for
    /// the whole frame; the register block is read-only.
    pub fn render(
        &mut self,
        vram: &mut [u8; VRAM_SIZE],
        regs: &[u32; REG_WORDS],
    ) -> Result<(), RenderError> {
        let mut renderer = Renderer {
            vram: Vram::new(vram),
            regs: Registers::new(regs),
            tile: &mut self.tile,
            fpu: &mut self.fpu,
        };
        renderer.render_core()
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot frame render with fresh core state.
pub fn render(vram: &mut [u8; VRAM_SIZE], regs: &[u32; REG_WORDS]) -> Result<(), RenderError> {
    Core::new().render(vram, regs)
}
