/// Engine tuning knobs.
///
/// The defaults reproduce the recovery ladder the engine was written around:
/// up to three consecutive transport failures are handled by reopening the
/// transport alone, failures four through six power cycle the modem first,
/// and the seventh gives up for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub(crate) power_cycle_after: u32,
    pub(crate) give_up_after: u32,
    pub(crate) builtin_setup: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            power_cycle_after: 4,
            give_up_after: 7,
            builtin_setup: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive-failure count at which recovery escalates from a plain
    /// transport reopen to a full modem power cycle.
    pub fn with_power_cycle_after(mut self, failures: u32) -> Self {
        self.power_cycle_after = failures;
        self
    }

    /// Consecutive-failure count at which recovery gives up and the engine
    /// shuts down.
    pub fn with_give_up_after(mut self, failures: u32) -> Self {
        self.give_up_after = failures;
        self
    }

    /// Disable the builtin setup commands (`ATE1Q0V1`, `AT+CMEE=1`) issued
    /// after every transport (re)open. The echo and extended-error settings
    /// they establish are load-bearing for the framer, so this is only
    /// useful when [`Device::setup_commands`] provides equivalents.
    ///
    /// [`Device::setup_commands`]: crate::Device::setup_commands
    pub fn with_builtin_setup(mut self, enabled: bool) -> Self {
        self.builtin_setup = enabled;
        self
    }
}
