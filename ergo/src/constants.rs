use crate::terminal::StyleId;

pub(crate) const ASCII_ART: &str = r#"
       ─────────────────────────
       █████████████████████████
     █▀▀▀▀  █▀▀▀█  █▀▀▀▀  █▀▀▀█
     █▀▀    █▀▀█▀  █  ▀█  █   █
     █▄▄▄▄  █   █  █▄▄▄█  █▄▄▄█
       ████████ ergo 0.1 ███████
       ─────────────────────────
"#;
pub(crate) const STYLE_LOGO: StyleId = 0;
pub(crate) const STYLE_INFO: StyleId = 1;
pub(crate) const STYLE_FORMULA: StyleId = 2;
pub(crate) const STYLE_SUCCESS: StyleId = 3;
pub(crate) const STYLE_FAILURE: StyleId = 4;
pub(crate) const STYLE_WARNING: StyleId = 5;
