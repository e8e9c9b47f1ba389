//! UART baud rate descriptors
//!
//! Divisors assume PLL1 at its default 147.461538 MHz.

/// Clock and divisor settings for a single link rate
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BaudInfo {
    /// Baud rate in bits per second, zero marks the end of a table
    pub rate: u32,
    /// Clock generator register value (divisor and clock source)
    pub clkgen: u16,
    /// Baud rate divisor register value
    pub brd: u16,
}

impl BaudInfo {
    /// Table terminator
    pub const END: BaudInfo = BaudInfo { rate: 0, clkgen: 0, brd: 0 };

    pub const fn new(rate: u32, clksrc: u16, div: u16, brd: u16) -> Self {
        Self {
            rate,
            clkgen: (div << 4) | (clksrc << 1),
            brd,
        }
    }
}

/// Supported rates, slowest (default) first
pub static BAUD_TABLE: [BaudInfo; 10] = [
    BaudInfo::new(19_200, 1, 39, 11),
    BaudInfo::new(38_400, 1, 39, 5),
    BaudInfo::new(57_600, 1, 39, 3),
    BaudInfo::new(115_200, 1, 39, 1),
    BaudInfo::new(230_400, 1, 4, 7),
    BaudInfo::new(460_800, 1, 4, 3),
    BaudInfo::new(614_400, 1, 4, 2),
    BaudInfo::new(921_600, 1, 4, 1),
    BaudInfo::new(1_500_000, 0, 15, 0),
    BaudInfo::END,
];

/// Find the descriptor for an exact baud rate.
///
/// The search stops at the first zero-rate entry.
pub fn find_baudinfo(table: &[BaudInfo], rate: u32) -> Option<&BaudInfo> {
    table
        .iter()
        .take_while(|b| b.rate != 0)
        .find(|b| b.rate == rate)
}
