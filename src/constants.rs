/// Column names of the fulfillment export, used as configuration defaults
pub const COL_ORDER_ID: &str = "SC Order No/Track ID/CSRM No";
pub const COL_WORKORDER: &str = "Workorder";
pub const COL_DATE_CREATED: &str = "Date Created";
pub const COL_SERVICE_NO: &str = "Service No.";
pub const COL_CRM_ORDER_TYPE: &str = "CRM Order Type";
pub const COL_STATUS: &str = "Status";
pub const COL_ADDRESS: &str = "Address";
pub const COL_CUSTOMER_NAME: &str = "Customer Name";
pub const COL_WORKZONE: &str = "Workzone";
pub const COL_BOOKING_DATE: &str = "Booking Date";
pub const COL_CONTACT_NUMBER: &str = "Contact Number";
pub const COL_MITRA: &str = "Mitra";

/// Cell contents treated as missing after trimming (compared case-insensitively)
pub const NULL_TOKENS: &[&str] = &["", "nan", "null", "none", "-", "n/a"];

/// Accepted input date layouts, tried in order
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Date-only layouts, read as midnight
pub const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Layout used when a date is rendered in the final output
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Layout used by the quality fixer; it is also the first entry of DATE_FORMATS
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_PARTNER: &str = "TSEL";

pub const MONTH_NAMES: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September",
    "Oktober", "November", "Desember",
];

pub const MONTH_SHORT_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "Mei", "Jun", "Jul", "Agu", "Sep", "Okt", "Nov", "Des",
];

/// Indonesian month name for a 1-based month number
pub fn month_name(month: u32, short: bool) -> &'static str {
    let table = if short { &MONTH_SHORT_NAMES } else { &MONTH_NAMES };
    match month {
        1..=12 => table[(month - 1) as usize],
        _ => "Unknown",
    }
}
