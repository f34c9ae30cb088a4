use bitfield::bitfield;

bitfield! {
    /// Encoder teletext control register.
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct TeletextControl(u32);
    impl Debug;
    pub enable, set_enable: 0;
    pub u8, system, set_system: 2, 1;
    // bytes per line including clock run-in and framing code
    pub u8, line_size, set_line_size: 15, 8;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TeletextSystem {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

impl TeletextSystem {
    /// Bytes per VBI line for a raster with `lines_per_frame` lines, or
    /// `None` if the system can't be carried on it.
    pub fn line_size(self, lines_per_frame: u32) -> Option<u8> {
        let is_625 = lines_per_frame == 625;
        match self {
            TeletextSystem::A if is_625 => Some(40),
            TeletextSystem::A => None,
            TeletextSystem::B if is_625 => Some(45),
            TeletextSystem::B => Some(37),
            TeletextSystem::C => Some(36),
            TeletextSystem::D => Some(37),
        }
    }
}
