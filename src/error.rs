use core::fmt;

/// Output limits were configured with `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MinMaxError {
    pub min: i64,
    pub max: i64,
}

impl fmt::Display for MinMaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min: {} is greater than max: {}", self.min, self.max)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MinMaxError {}
