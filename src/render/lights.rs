//! Exterior light state packed into one 32-bit word

/// Beacon and strobe timing scheme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlashPattern {
    /// One short flash per period
    #[default]
    Default = 0,
    /// Airbus-style double flash
    Eads = 1,
    /// General aviation, long beacon
    Ga = 2,
}

impl FlashPattern {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => FlashPattern::Eads,
            2 => FlashPattern::Ga,
            _ => FlashPattern::Default,
        }
    }
}

const OFFSET_MASK: u32 = 0xFFFF;
const LANDING_BIT: u32 = 1 << 16;
const BEACON_BIT: u32 = 1 << 17;
const STROBE_BIT: u32 = 1 << 18;
const NAV_BIT: u32 = 1 << 19;
const PATTERN_SHIFT: u32 = 20;
const PATTERN_MASK: u32 = 0xF;

/// Light switches, a 16-bit phase offset and the flash pattern.
///
/// Layout from the low bit: offset (16), landing, beacon, strobe, nav,
/// pattern (4).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LightStatus(u32);

impl LightStatus {
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Beacon and nav lights on, as used when the provider has no surface data
    pub fn taxi_default() -> Self {
        Self::default().with_beacon(true).with_nav(true)
    }

    fn with_bit(self, bit: u32, on: bool) -> Self {
        if on { Self(self.0 | bit) } else { Self(self.0 & !bit) }
    }

    pub fn with_landing(self, on: bool) -> Self {
        self.with_bit(LANDING_BIT, on)
    }

    pub fn with_beacon(self, on: bool) -> Self {
        self.with_bit(BEACON_BIT, on)
    }

    pub fn with_strobe(self, on: bool) -> Self {
        self.with_bit(STROBE_BIT, on)
    }

    pub fn with_nav(self, on: bool) -> Self {
        self.with_bit(NAV_BIT, on)
    }

    pub fn with_time_offset(self, offset: u16) -> Self {
        Self((self.0 & !OFFSET_MASK) | u32::from(offset))
    }

    pub fn with_pattern(self, pattern: FlashPattern) -> Self {
        let cleared = self.0 & !(PATTERN_MASK << PATTERN_SHIFT);
        Self(cleared | ((pattern as u32) << PATTERN_SHIFT))
    }

    pub fn time_offset(self) -> u16 {
        (self.0 & OFFSET_MASK) as u16
    }

    pub fn landing(self) -> bool {
        self.0 & LANDING_BIT != 0
    }

    pub fn beacon(self) -> bool {
        self.0 & BEACON_BIT != 0
    }

    pub fn strobe(self) -> bool {
        self.0 & STROBE_BIT != 0
    }

    pub fn nav(self) -> bool {
        self.0 & NAV_BIT != 0
    }

    pub fn pattern(self) -> FlashPattern {
        FlashPattern::from_bits((self.0 >> PATTERN_SHIFT) & PATTERN_MASK)
    }

    fn phase(self, elapsed_ms: u64) -> u64 {
        elapsed_ms + u64::from(self.time_offset())
    }

    /// Beacon flash state at a point in time (false if switched off)
    fn beacon_lit_at(self, elapsed_ms: u64) -> bool {
        if !self.beacon() {
            return false;
        }
        let t = self.phase(elapsed_ms);
        match self.pattern() {
            FlashPattern::Default => t % 1200 < 120,
            FlashPattern::Eads => {
                let x = t % 1200;
                x < 120 || (x > 240 && x < 360)
            }
            FlashPattern::Ga => t % 2100 < 900,
        }
    }

    /// Strobe flash state at a point in time (false if switched off)
    fn strobe_lit_at(self, elapsed_ms: u64) -> bool {
        if !self.strobe() {
            return false;
        }
        let t = self.phase(elapsed_ms);
        match self.pattern() {
            FlashPattern::Default => t % 1700 < 80,
            FlashPattern::Eads => {
                let x = t % 1700;
                x < 80 || (x > 260 && x < 340)
            }
            FlashPattern::Ga => t % 1900 < 100,
        }
    }

    /// `(beacon, strobe)` lit at a point in time
    pub fn flashing_at(self, elapsed_ms: u64) -> (bool, bool) {
        (self.beacon_lit_at(elapsed_ms), self.strobe_lit_at(elapsed_ms))
    }
}
