use serde::{Deserialize, Serialize};

/// VCP feature code for input source selection.
pub const INPUT_SOURCE_FEATURE: u8 = 0x60;

/// Composite hardware identity used to match a monitor against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorKey {
    pub serial_num: Option<u64>,
    pub product_code: Option<u32>,
}

impl MonitorKey {
    /// Returns `None` when neither half of the key is known.
    pub fn new(serial_num: Option<u64>, product_code: Option<u32>) -> Option<Self> {
        if serial_num.is_none() && product_code.is_none() {
            return None;
        }
        Some(Self { serial_num, product_code })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub code: u16,
    pub name: String,
}

/// One DDC/CI display as reported by ddcutil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub number: u32,
    pub name: String,
    pub serial_num: Option<u64>,
    pub product_code: Option<u32>,
    pub current_input: Option<u16>,
    inputs: Vec<u16>,
    input_names: Vec<String>,
    pub initialized: bool,
}

impl Monitor {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            name: String::new(),
            serial_num: None,
            product_code: None,
            current_input: None,
            inputs: Vec::new(),
            input_names: Vec::new(),
            initialized: false,
        }
    }

    pub fn key(&self) -> Option<MonitorKey> {
        MonitorKey::new(self.serial_num, self.product_code)
    }

    /// Name shown in the menu; falls back to the ordinal when ddcutil gave no model.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Display {}", self.number)
        } else {
            self.name.clone()
        }
    }

    pub fn push_input(&mut self, code: u16, name: impl Into<String>) {
        self.inputs.push(code);
        self.input_names.push(name.into());
    }

    /// Replaces the input list and marks the monitor initialized.
    pub fn set_inputs(&mut self, sources: Vec<InputSource>) {
        self.inputs.clear();
        self.input_names.clear();
        for source in sources {
            self.push_input(source.code, source.name);
        }
        self.initialized = true;
    }

    pub fn inputs(&self) -> &[u16] {
        &self.inputs
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn input_sources(&self) -> impl Iterator<Item = InputSource> + '_ {
        self.inputs
            .iter()
            .zip(self.input_names.iter())
            .map(|(code, name)| InputSource { code: *code, name: name.clone() })
    }

    pub fn supports_input(&self, code: u16) -> bool {
        self.inputs.contains(&code)
    }

    pub fn input_name(&self, code: u16) -> Option<&str> {
        self.inputs
            .iter()
            .position(|c| *c == code)
            .map(|idx| self.input_names[idx].as_str())
    }
}
