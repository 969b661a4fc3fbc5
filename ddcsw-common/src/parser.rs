//! Parsers for the plain-text output of `ddcutil detect`, `capabilities` and `getvcp`.
//!
//! ddcutil has no machine readable output for these subcommands, so everything
//! here works by line prefix matching, with regex captures for the values.
//! Unknown lines are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::monitor::{InputSource, Monitor};

const DISPLAY_PREFIX: &str = "Display ";
const MODEL_PREFIX: &str = "Model:";
const SERIAL_PREFIX: &str = "Binary serial number:";
const PRODUCT_CODE_PREFIX: &str = "Product code:";
const INPUT_FEATURE_MARKER: &str = "Feature: 60";
const FEATURE_MARKER: &str = "Feature:";
const VALUES_MARKER: &str = "Values:";

static DISPLAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Display\s+(\d+)").expect("display pattern"));
static LEADING_DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("decimal pattern"));
static VALUE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9A-Fa-f]+):\s*(.*)$").expect("value line pattern"));
static SL_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sl=0[xX]([0-9A-Fa-f]+)").expect("sl value pattern"));
static ANY_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=\s*(?:0[xX])?([0-9A-Fa-f]+)").expect("value pattern"));

/// A display block from `ddcutil detect`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectedDisplay {
    pub number: u32,
    pub model: Option<String>,
    pub serial_num: Option<u64>,
    pub product_code: Option<u32>,
}

impl DetectedDisplay {
    pub fn into_monitor(self) -> Monitor {
        let mut monitor = Monitor::new(self.number);
        monitor.name = self.model.unwrap_or_default();
        monitor.serial_num = self.serial_num;
        monitor.product_code = self.product_code;
        monitor
    }
}

/// Result of parsing `ddcutil -d N capabilities`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub model: Option<String>,
    pub inputs: Vec<InputSource>,
}

pub fn parse_detect(stdout: &str) -> Vec<DetectedDisplay> {
    let mut displays = Vec::new();
    let mut current: Option<DetectedDisplay> = None;

    for line in stdout.lines() {
        if line.starts_with(DISPLAY_PREFIX) {
            if let Some(display) = current.take() {
                displays.push(display);
            }
            let number = DISPLAY_RE
                .captures(line)
                .and_then(|c| c[1].parse::<u32>().ok());
            match number {
                Some(number) => {
                    current = Some(DetectedDisplay {
                        number,
                        ..Default::default()
                    });
                }
                None => log::warn!("Ignoring display line without usable ordinal: {:?}", line),
            }
            continue;
        }

        // Any other unindented line ("Invalid display", "Phantom display") ends the block
        if !line.is_empty() && !line.starts_with(char::is_whitespace) {
            if let Some(display) = current.take() {
                displays.push(display);
            }
            continue;
        }

        let Some(display) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix(MODEL_PREFIX) {
            let value = value.trim();
            if !value.is_empty() {
                display.model = Some(value.to_string());
            }
        } else if let Some(value) = trimmed.strip_prefix(SERIAL_PREFIX) {
            display.serial_num = leading_decimal(value);
        } else if let Some(value) = trimmed.strip_prefix(PRODUCT_CODE_PREFIX) {
            display.product_code = leading_decimal(value);
        }
    }

    if let Some(display) = current.take() {
        displays.push(display);
    }
    displays
}

pub fn parse_capabilities(stdout: &str) -> Capabilities {
    let mut capabilities = Capabilities::default();
    let lines: Vec<&str> = stdout.lines().collect();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if capabilities.model.is_none() {
            if let Some(value) = trimmed.strip_prefix(MODEL_PREFIX) {
                let value = value.trim();
                if !value.is_empty() {
                    capabilities.model = Some(value.to_string());
                }
            }
        }

        if line.contains(INPUT_FEATURE_MARKER)
            && i + 1 < lines.len()
            && lines[i + 1].contains(VALUES_MARKER)
        {
            let values_line = lines[i + 1];
            let inline = values_line
                .split_once(VALUES_MARKER)
                .map(|(_, rest)| rest)
                .unwrap_or("");
            capabilities.inputs.extend(parse_inline_values(inline));

            i += 2;
            while i < lines.len() && !lines[i].contains(FEATURE_MARKER) {
                if let Some(source) = parse_value_line(lines[i]) {
                    capabilities.inputs.push(source);
                }
                i += 1;
            }
            break;
        }
        i += 1;
    }

    capabilities
}

/// Extracts the current input code from `ddcutil getvcp 60` output,
/// e.g. `VCP code 0x60 (Input Source): DisplayPort-1 (sl=0x0f)`.
pub fn parse_current_input(stdout: &str) -> Option<u16> {
    let captures = SL_VALUE_RE
        .captures(stdout)
        .or_else(|| ANY_VALUE_RE.captures(stdout))?;
    u16::from_str_radix(&captures[1], 16).ok()
}

/// Standard MCCS names for input source codes.
pub fn mccs_input_name(code: u16) -> Option<&'static str> {
    let name = match code {
        0x01 => "VGA-1",
        0x02 => "VGA-2",
        0x03 => "DVI-1",
        0x04 => "DVI-2",
        0x05 => "Composite video 1",
        0x06 => "Composite video 2",
        0x07 => "S-Video-1",
        0x08 => "S-Video-2",
        0x09 => "Tuner-1",
        0x0a => "Tuner-2",
        0x0b => "Tuner-3",
        0x0c => "Component video 1",
        0x0d => "Component video 2",
        0x0e => "Component video 3",
        0x0f => "DisplayPort-1",
        0x10 => "DisplayPort-2",
        0x11 => "HDMI-1",
        0x12 => "HDMI-2",
        0x1b => "USB-C",
        _ => return None,
    };
    Some(name)
}

/// `         0f: DisplayPort-1`
fn parse_value_line(line: &str) -> Option<InputSource> {
    let captures = VALUE_LINE_RE.captures(line)?;
    let code = u16::from_str_radix(&captures[1], 16).ok()?;
    let name = captures[2].trim();
    let name = if name.is_empty() { fallback_name(code) } else { name.to_string() };
    Some(InputSource { code, name })
}

/// `Values: 0f 11 12 (interpretation unavailable)`
fn parse_inline_values(rest: &str) -> Vec<InputSource> {
    rest.split_whitespace()
        .take_while(|token| !token.starts_with('('))
        .filter_map(|token| u16::from_str_radix(token, 16).ok())
        .map(|code| InputSource { code, name: fallback_name(code) })
        .collect()
}

fn fallback_name(code: u16) -> String {
    mccs_input_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Input 0x{:02x}", code))
}

/// Out-of-range numbers yield `None` rather than wrapping.
fn leading_decimal<T: std::str::FromStr>(value: &str) -> Option<T> {
    LEADING_DECIMAL_RE
        .captures(value)
        .and_then(|c| c[1].parse().ok())
}
