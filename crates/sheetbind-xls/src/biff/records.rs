//! BIFF8 record type constants read by this crate.
//!
//! Reference: [MS-XLS] section 2.3, Record Enumeration

// Stream structure
pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;
pub const CONTINUE: u16 = 0x003C;

// Workbook globals
pub const BOUNDSHEET: u16 = 0x0085; // name, type, visibility, stream offset
pub const SST: u16 = 0x00FC;
pub const PALETTE: u16 = 0x0092;
pub const FONT: u16 = 0x0031;
pub const FORMAT: u16 = 0x041E;
pub const XF: u16 = 0x00E0;
pub const NAME: u16 = 0x0018;
pub const EXTERNSHEET: u16 = 0x0017;

// Cell records
pub const LABELSST: u16 = 0x00FD;
pub const LABEL: u16 = 0x0204;
pub const NUMBER: u16 = 0x0203;
pub const RK: u16 = 0x027E;
pub const MULRK: u16 = 0x00BD;
pub const BLANK: u16 = 0x0201;
pub const MULBLANK: u16 = 0x00BE;
pub const BOOLERR: u16 = 0x0205;
pub const FORMULA: u16 = 0x0006;
pub const STRING: u16 = 0x0207; // cached string result of the preceding FORMULA

// Sheet structure
pub const ROW: u16 = 0x0208;
pub const COLINFO: u16 = 0x007D;
pub const MERGECELLS: u16 = 0x00E5;

// BOF substream types
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;

pub const BIFF8_VERSION: u16 = 0x0600;
