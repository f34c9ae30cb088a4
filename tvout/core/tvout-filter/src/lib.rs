//! # Scaler filter selection
//!
//! The video pipes resize with polyphase filters, and which coefficient set
//! gives the least ringing depends on how far the picture is being shrunk.
//! Selection is a pure function of the source increment (`scale`, how many
//! source pixels/lines advance per output pixel/line) and the initial
//! sub-pixel `phase`, both with 13 fractional bits.
//!
//! ```
//! use tvout_filter::{select_horizontal_luma, ScalerFilter, FIXED_ONE};
//!
//! // 1:1, aligned: the pass-through set
//! assert_eq!(select_horizontal_luma(FIXED_ONE, 0), ScalerFilter::B);
//! // 1:1 but shifted half a pixel: interpolate
//! assert_eq!(select_horizontal_luma(FIXED_ONE, FIXED_ONE / 2), ScalerFilter::A);
//! ```
#![no_std]
extern crate alloc;

pub mod registry;

pub use registry::{CoefficientRegistry, CoefficientTable, CoefficientTableRef, RegistryError, TableSlot, SHARED_COEFFICIENTS};

pub const FIXED_SHIFT: u32 = 13;
/// 1.0 in scale/phase fixed point.
pub const FIXED_ONE: u32 = 1 << FIXED_SHIFT;

/// Number of content range mapping profiles (`RANGE_MAPY`/`RANGE_MAPUV` 0..=7).
pub const RANGE_MAP_PROFILES: u32 = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalerFilter {
    /// Zoom/interpolation set, also used for sub-pixel shifts at 1:1.
    A,
    /// Pass-through.
    B,
    LumaC,
    LumaD,
    LumaE,
    LumaF,
    ChromaC,
    ChromaD,
    ChromaE,
    ChromaF,
    /// 4:2:0/4:2:2 chroma upsampling by exactly two.
    Chroma2x,
}

impl ScalerFilter {
    pub const COUNT: usize = 11;

    pub const ALL: [ScalerFilter; Self::COUNT] = [
        ScalerFilter::A,
        ScalerFilter::B,
        ScalerFilter::LumaC,
        ScalerFilter::LumaD,
        ScalerFilter::LumaE,
        ScalerFilter::LumaF,
        ScalerFilter::ChromaC,
        ScalerFilter::ChromaD,
        ScalerFilter::ChromaE,
        ScalerFilter::ChromaF,
        ScalerFilter::Chroma2x,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Upper (inclusive) scale bounds for the C, D and E sets; anything above
/// `e` gets the F set.
#[derive(Debug, Copy, Clone)]
struct Cascade {
    c: u32,
    d: u32,
    e: u32,
}

const HORIZONTAL: Cascade = Cascade {
    c: FIXED_ONE * 3 / 2,
    d: FIXED_ONE * 2,
    e: FIXED_ONE * 3,
};

// vertical taps are shorter, so the sharper sets run out sooner
const VERTICAL: Cascade = Cascade {
    c: FIXED_ONE * 5 / 4,
    d: FIXED_ONE * 7 / 4,
    e: FIXED_ONE * 5 / 2,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Component {
    Luma,
    Chroma,
}

const fn cascade(scale: u32, phase: u32, steps: Cascade, component: Component) -> ScalerFilter {
    if matches!(component, Component::Chroma) && scale == FIXED_ONE / 2 {
        return ScalerFilter::Chroma2x;
    }

    if scale < FIXED_ONE {
        return ScalerFilter::A;
    }

    if scale == FIXED_ONE {
        return if phase == 0 { ScalerFilter::B } else { ScalerFilter::A };
    }

    let step = if scale <= steps.c {
        0
    } else if scale <= steps.d {
        1
    } else if scale <= steps.e {
        2
    } else {
        3
    };

    match (component, step) {
        (Component::Luma, 0) => ScalerFilter::LumaC,
        (Component::Luma, 1) => ScalerFilter::LumaD,
        (Component::Luma, 2) => ScalerFilter::LumaE,
        (Component::Luma, _) => ScalerFilter::LumaF,
        (Component::Chroma, 0) => ScalerFilter::ChromaC,
        (Component::Chroma, 1) => ScalerFilter::ChromaD,
        (Component::Chroma, 2) => ScalerFilter::ChromaE,
        (Component::Chroma, _) => ScalerFilter::ChromaF,
    }
}

pub const fn select_horizontal_luma(scale: u32, phase: u32) -> ScalerFilter {
    cascade(scale, phase, HORIZONTAL, Component::Luma)
}

pub const fn select_horizontal_chroma(scale: u32, phase: u32) -> ScalerFilter {
    cascade(scale, phase, HORIZONTAL, Component::Chroma)
}

pub const fn select_vertical_luma(scale: u32, phase: u32) -> ScalerFilter {
    cascade(scale, phase, VERTICAL, Component::Luma)
}

pub const fn select_vertical_chroma(scale: u32, phase: u32) -> ScalerFilter {
    cascade(scale, phase, VERTICAL, Component::Chroma)
}

/// A vertical selection that may go through one of the range mapping
/// coefficient banks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MappedFilter {
    pub filter: ScalerFilter,
    /// `None` when the profile id was out of range and the plain set is used.
    pub profile: Option<u8>,
}

impl MappedFilter {
    pub const fn table_slot(&self) -> TableSlot {
        match self.profile {
            Some(profile) => TableSlot::RangeMapped { filter: self.filter, profile },
            None => TableSlot::Base(self.filter),
        }
    }
}

const fn map_profile(filter: ScalerFilter, profile: u32) -> MappedFilter {
    MappedFilter {
        filter,
        profile: if profile < RANGE_MAP_PROFILES { Some(profile as u8) } else { None },
    }
}

pub const fn select_vertical_luma_range_mapped(scale: u32, phase: u32, profile: u32) -> MappedFilter {
    map_profile(select_vertical_luma(scale, phase), profile)
}

pub const fn select_vertical_chroma_range_mapped(scale: u32, phase: u32, profile: u32) -> MappedFilter {
    map_profile(select_vertical_chroma(scale, phase), profile)
}
