//! Display mode descriptors and TV standard flags.

bitflags::bitflags! {
    /// Analogue/digital TV standards. A mode advertises the set it can
    /// carry; a running output uses one of them, possibly with the pixel
    /// repetition and CEA-861 flags or'd in.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct TvStandard: u32 {
        const PAL_BDGHI   = 1 << 0;
        const PAL_M       = 1 << 1;
        const PAL_N       = 1 << 2;
        const PAL_NC      = 1 << 3;
        const NTSC_M      = 1 << 4;
        const NTSC_J      = 1 << 5;
        const NTSC_443    = 1 << 6;
        const SECAM       = 1 << 7;
        const PAL_60      = 1 << 8;
        /// 480p/576p, "ED"
        const SMPTE293M   = 1 << 9;

        const SMPTE240M   = 1 << 16;
        const SMPTE274M   = 1 << 17;
        const SMPTE295M   = 1 << 18;
        const SMPTE296M   = 1 << 19;
        const AS4933      = 1 << 20;

        const VESA        = 1 << 24;

        const PIXELREP_2X = 1 << 29;
        const PIXELREP_4X = 1 << 30;
        const CEA861C     = 1 << 31;

        /// Interlaced SD standards, produced with sync insertion by the encoder.
        const SD_MASK = 0x1FF;
        const HD_MASK = Self::SMPTE240M.bits()
            | Self::SMPTE274M.bits()
            | Self::SMPTE295M.bits()
            | Self::SMPTE296M.bits()
            | Self::AS4933.bits();
    }
}

impl TvStandard {
    /// Standards in the definite sync insertion family go through the
    /// analogue encoder; everything else (ED/HD/VESA) is timing-only.
    #[inline(always)]
    pub fn is_sync_insertion_family(self) -> bool {
        self.intersects(Self::SD_MASK)
    }

    /// 480p/576p output cannot be combined with any secondary flags.
    pub fn normalized(self) -> Self {
        if self.contains(Self::SMPTE293M) {
            Self::SMPTE293M
        } else {
            self
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanType {
    Progressive,
    Interlaced,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FieldParity {
    Top,
    Bottom,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayMode {
    pub active_width: u32,
    pub active_height: u32,
    pub pixels_per_line: u32,
    pub lines_per_frame: u32,
    pub pixel_clock_hz: u32,
    /// Field rate in mHz (59940 for NTSC).
    pub vertical_refresh_mhz: u32,
    pub scan_type: ScanType,
    pub standards: TvStandard,
}

impl DisplayMode {
    /// Duration of one vsync period in microseconds.
    pub fn field_duration_us(&self) -> u32 {
        if self.vertical_refresh_mhz == 0 {
            return 0;
        }
        1_000_000_000 / self.vertical_refresh_mhz
    }

    pub fn supports(&self, standard: TvStandard) -> bool {
        !standard.is_empty() && self.standards.contains(standard)
    }

    /// Same picture geometry, so only the timing generator needs to change.
    pub fn same_raster(&self, other: &DisplayMode) -> bool {
        self.active_width == other.active_width
            && self.active_height == other.active_height
            && self.scan_type == other.scan_type
    }
}

const NTSC_FAMILY: TvStandard = TvStandard::NTSC_M
    .union(TvStandard::NTSC_J)
    .union(TvStandard::NTSC_443)
    .union(TvStandard::PAL_M)
    .union(TvStandard::PAL_60);

const PAL_FAMILY: TvStandard = TvStandard::PAL_BDGHI
    .union(TvStandard::PAL_N)
    .union(TvStandard::PAL_NC)
    .union(TvStandard::SECAM);

pub const MODE_480I59_94: DisplayMode = DisplayMode {
    active_width: 720,
    active_height: 480,
    pixels_per_line: 858,
    lines_per_frame: 525,
    pixel_clock_hz: 13_500_000,
    vertical_refresh_mhz: 59_940,
    scan_type: ScanType::Interlaced,
    standards: NTSC_FAMILY,
};

pub const MODE_576I50: DisplayMode = DisplayMode {
    active_width: 720,
    active_height: 576,
    pixels_per_line: 864,
    lines_per_frame: 625,
    pixel_clock_hz: 13_500_000,
    vertical_refresh_mhz: 50_000,
    scan_type: ScanType::Interlaced,
    standards: PAL_FAMILY,
};

pub const MODE_480P59_94: DisplayMode = DisplayMode {
    active_width: 720,
    active_height: 480,
    pixels_per_line: 858,
    lines_per_frame: 525,
    pixel_clock_hz: 27_000_000,
    vertical_refresh_mhz: 59_940,
    scan_type: ScanType::Progressive,
    standards: TvStandard::SMPTE293M.union(TvStandard::CEA861C),
};

pub const MODE_720P60: DisplayMode = DisplayMode {
    active_width: 1280,
    active_height: 720,
    pixels_per_line: 1650,
    lines_per_frame: 750,
    pixel_clock_hz: 74_250_000,
    vertical_refresh_mhz: 60_000,
    scan_type: ScanType::Progressive,
    standards: TvStandard::SMPTE296M.union(TvStandard::CEA861C),
};

pub const MODE_720P50: DisplayMode = DisplayMode {
    pixels_per_line: 1980,
    vertical_refresh_mhz: 50_000,
    ..MODE_720P60
};

pub const MODE_1080I60: DisplayMode = DisplayMode {
    active_width: 1920,
    active_height: 1080,
    pixels_per_line: 2200,
    lines_per_frame: 1125,
    pixel_clock_hz: 74_250_000,
    vertical_refresh_mhz: 60_000,
    scan_type: ScanType::Interlaced,
    standards: TvStandard::SMPTE274M.union(TvStandard::CEA861C),
};

pub const MODE_1080I50: DisplayMode = DisplayMode {
    pixels_per_line: 2640,
    vertical_refresh_mhz: 50_000,
    ..MODE_1080I60
};

pub const MODE_1080P60: DisplayMode = DisplayMode {
    pixel_clock_hz: 148_500_000,
    scan_type: ScanType::Progressive,
    ..MODE_1080I60
};

pub const MODE_VGA_P60: DisplayMode = DisplayMode {
    active_width: 640,
    active_height: 480,
    pixels_per_line: 800,
    lines_per_frame: 525,
    pixel_clock_hz: 25_200_000,
    vertical_refresh_mhz: 60_000,
    scan_type: ScanType::Progressive,
    standards: TvStandard::VESA,
};
