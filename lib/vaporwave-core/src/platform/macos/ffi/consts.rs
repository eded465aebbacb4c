macro_rules! cf_str {
    ($name:ident, $value:expr) => {
        pub fn $name() -> CFString {
            CFString::from_static_string($value)
        }
    };
}

pub mod window_info {
    use core_foundation::string::CFString;

    cf_str!(number, "kCGWindowNumber");
    cf_str!(owner_pid, "kCGWindowOwnerPID");
    cf_str!(owner_name, "kCGWindowOwnerName");
    cf_str!(name, "kCGWindowName");
    cf_str!(layer, "kCGWindowLayer");
    cf_str!(bounds, "kCGWindowBounds");
}
