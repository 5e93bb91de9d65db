// Rendering register block. The host owns the 32 KiB register file; the core
// borrows it read-only and overlays typed bit-field views at fixed offsets.

use crate::types::ParamTag;
use bitfield::bitfield;

pub const REG_SIZE: usize = 0x8000;
pub const REG_WORDS: usize = REG_SIZE / 4;
const REG_WORD_MASK: usize = REG_WORDS - 1;

// Register byte offsets (word granularity, 32-bit each).
pub const PARAM_BASE_ADDR: u32 = 0x0000_0020;
pub const REGION_BASE_ADDR: u32 = 0x0000_002C;
pub const VO_BORDER_COL_ADDR: u32 = 0x0000_0040;
pub const FB_W_CTRL_ADDR: u32 = 0x0000_0048;
pub const FB_W_LINESTRIDE_ADDR: u32 = 0x0000_004C;
pub const FB_W_SOF1_ADDR: u32 = 0x0000_0060;
pub const FB_W_SOF2_ADDR: u32 = 0x0000_0064;
pub const FPU_SHAD_SCALE_ADDR: u32 = 0x0000_0074;
pub const FPU_CULL_VAL_ADDR: u32 = 0x0000_0078;
pub const FPU_PARAM_CFG_ADDR: u32 = 0x0000_007C;
pub const HALF_OFFSET_ADDR: u32 = 0x0000_0080;
pub const ISP_BACKGND_D_ADDR: u32 = 0x0000_0088;
pub const ISP_BACKGND_T_ADDR: u32 = 0x0000_008C;
pub const ISP_FEED_CFG_ADDR: u32 = 0x0000_0098;
pub const FOG_COL_RAM_ADDR: u32 = 0x0000_00B0;
pub const FOG_COL_VERT_ADDR: u32 = 0x0000_00B4;
pub const FOG_DENSITY_ADDR: u32 = 0x0000_00B8;
pub const FOG_CLAMP_MAX_ADDR: u32 = 0x0000_00BC;
pub const FOG_CLAMP_MIN_ADDR: u32 = 0x0000_00C0;
pub const TEXT_CONTROL_ADDR: u32 = 0x0000_00E4;
pub const SCALER_CTL_ADDR: u32 = 0x0000_00F4;
pub const PAL_RAM_CTRL_ADDR: u32 = 0x0000_0108;
pub const PT_ALPHA_REF_ADDR: u32 = 0x0000_011C;

pub const FOG_TABLE_START_ADDR: u32 = 0x0000_0200;
pub const PALETTE_RAM_START_ADDR: u32 = 0x0000_1000;

bitfield! {
    #[derive(Copy, Clone)]
    pub struct FbWCtrl(u32);
    impl Debug;

    pub fb_packmode, set_fb_packmode: 2, 0;
    pub fb_dither, set_fb_dither: 3;
    pub u8, fb_kval, set_fb_kval: 15, 8;
    pub u8, fb_alpha_threshold, set_fb_alpha_threshold: 23, 16;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct FbWLinestride(u32);
    impl Debug;

    pub stride, set_stride: 8, 0;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct ScalerCtl(u32);
    impl Debug;

    pub vscalefactor, set_vscalefactor: 15, 0;
    pub hscale, set_hscale: 16;
    pub interlace, set_interlace: 17;
    pub fieldselect, set_fieldselect: 18;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct IspFeedCfg(u32);
    impl Debug;

    pub pre_sort, set_pre_sort: 0;
    pub discard_mode, set_discard_mode: 3;
    pub pt_chunk_size, set_pt_chunk_size: 13, 4;
    pub tr_cache_size, set_tr_cache_size: 23, 14;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct FpuParamCfg(u32);
    impl Debug;

    pub pointer_first_burst, set_pointer_first_burst: 3, 0;
    pub pointer_burst, set_pointer_burst: 7, 4;
    pub isp_param_burst_threshold, set_isp_param_burst_threshold: 13, 8;
    pub tsp_param_burst_threshold, set_tsp_param_burst_threshold: 19, 14;
    pub region_header_type, set_region_header_type: 21;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct FpuShadScale(u32);
    impl Debug;

    pub u8, scale_factor, set_scale_factor: 7, 0;
    pub intensity_shadow, set_intensity_shadow: 8;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct HalfOffset(u32);
    impl Debug;

    pub fpu_pixel_half_offset, set_fpu_pixel_half_offset: 0;
    pub tsp_pixel_half_offset, set_tsp_pixel_half_offset: 1;
    pub texure_pixel_half_offset, set_texure_pixel_half_offset: 2;
}

bitfield! {
    #[derive(Copy, Clone)]
    pub struct VoBorderCol(u32);
    impl Debug;

    pub u8, blue, set_blue: 7, 0;
    pub u8, green, set_green: 15, 8;
    pub u8, red, set_red: 23, 16;
    pub chroma, set_chroma: 24;
}

/// Read-only typed view over the memory-mapped rendering registers.
#[derive(Copy, Clone)]
pub struct Registers<'a> {
    words: &'a [u32; REG_WORDS],
}

impl<'a> Registers<'a> {
    pub fn new(words: &'a [u32; REG_WORDS]) -> Self {
        Self { words }
    }

    #[inline]
    fn word(&self, byte_addr: u32) -> u32 {
        self.words[(byte_addr as usize / 4) & REG_WORD_MASK]
    }

    #[inline]
    pub fn param_base(&self) -> u32 {
        self.word(PARAM_BASE_ADDR)
    }

    #[inline]
    pub fn region_base(&self) -> u32 {
        self.word(REGION_BASE_ADDR)
    }

    #[inline]
    pub fn vo_border_col(&self) -> VoBorderCol {
        VoBorderCol(self.word(VO_BORDER_COL_ADDR))
    }

    #[inline]
    pub fn fb_w_ctrl(&self) -> FbWCtrl {
        FbWCtrl(self.word(FB_W_CTRL_ADDR))
    }

    #[inline]
    pub fn fb_w_linestride(&self) -> FbWLinestride {
        FbWLinestride(self.word(FB_W_LINESTRIDE_ADDR))
    }

    #[inline]
    pub fn fb_w_sof1(&self) -> u32 {
        self.word(FB_W_SOF1_ADDR)
    }

    #[inline]
    pub fn fb_w_sof2(&self) -> u32 {
        self.word(FB_W_SOF2_ADDR)
    }

    #[inline]
    pub fn fpu_shad_scale(&self) -> FpuShadScale {
        FpuShadScale(self.word(FPU_SHAD_SCALE_ADDR))
    }

    #[inline]
    pub fn fpu_cull_val(&self) -> f32 {
        f32::from_bits(self.word(FPU_CULL_VAL_ADDR))
    }

    #[inline]
    pub fn fpu_param_cfg(&self) -> FpuParamCfg {
        FpuParamCfg(self.word(FPU_PARAM_CFG_ADDR))
    }

    #[inline]
    pub fn half_offset(&self) -> HalfOffset {
        HalfOffset(self.word(HALF_OFFSET_ADDR))
    }

    #[inline]
    pub fn isp_backgnd_d(&self) -> f32 {
        f32::from_bits(self.word(ISP_BACKGND_D_ADDR))
    }

    #[inline]
    pub fn isp_backgnd_t(&self) -> ParamTag {
        ParamTag(self.word(ISP_BACKGND_T_ADDR))
    }

    #[inline]
    pub fn isp_feed_cfg(&self) -> IspFeedCfg {
        IspFeedCfg(self.word(ISP_FEED_CFG_ADDR))
    }

    #[inline]
    pub fn fog_col_ram(&self) -> u32 {
        self.word(FOG_COL_RAM_ADDR)
    }

    #[inline]
    pub fn fog_col_vert(&self) -> u32 {
        self.word(FOG_COL_VERT_ADDR)
    }

    #[inline]
    pub fn fog_density(&self) -> u32 {
        self.word(FOG_DENSITY_ADDR)
    }

    #[inline]
    pub fn fog_clamp_max(&self) -> u32 {
        self.word(FOG_CLAMP_MAX_ADDR)
    }

    #[inline]
    pub fn fog_clamp_min(&self) -> u32 {
        self.word(FOG_CLAMP_MIN_ADDR)
    }

    #[inline]
    pub fn text_control(&self) -> u32 {
        self.word(TEXT_CONTROL_ADDR)
    }

    #[inline]
    pub fn scaler_ctl(&self) -> ScalerCtl {
        ScalerCtl(self.word(SCALER_CTL_ADDR))
    }

    #[inline]
    pub fn pal_ram_ctrl(&self) -> u32 {
        self.word(PAL_RAM_CTRL_ADDR)
    }

    #[inline]
    pub fn pt_alpha_ref(&self) -> u32 {
        self.word(PT_ALPHA_REF_ADDR)
    }

    /// One of the 128 fog LUT words.
    #[inline]
    pub fn fog_table(&self, index: u32) -> u32 {
        self.word(FOG_TABLE_START_ADDR + (index & 127) * 4)
    }

    /// One of the 1024 palette RAM words.
    #[inline]
    pub fn palette(&self, index: u32) -> u32 {
        self.word(PALETTE_RAM_START_ADDR + (index & 1023) * 4)
    }
}
