/// Per-compilation name and label generators.
///
/// Both counters are monotonic for the lifetime of one compilation and are
/// never stored in statics, so compiling twice in one process cannot leak
/// state between runs. Identifier resolution and the IR builder share the
/// name counter; the loop labeller and the IR builder share the label
/// counter.
#[derive(Debug, Default)]
pub struct Context {
    name_counter: u32,
    label_counter: u32,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A globally unique value name: `prefix.N`. Used for α-renamed user
    /// variables and IR temporaries.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        let name = format!("{}.{}", prefix, self.name_counter);
        self.name_counter += 1;
        name
    }

    /// A globally unique label name: `prefix.N`.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        debug_assert!(!prefix.is_empty(), "label prefix cannot be empty");
        let label = format!("{}.{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }
}
