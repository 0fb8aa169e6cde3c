/// Path costs, heuristic values and evaluations.
///
/// Costs must be non-negative. `max_value()` is reserved as "unreachable".
pub trait Cost:
    Copy
    + std::fmt::Debug
    + std::fmt::Display
    + PartialEq
    + core::cmp::Eq
    + PartialOrd
    + Ord
    + num_traits::SaturatingAdd
    + num_traits::bounds::UpperBounded
    + num_traits::Zero
    + num_traits::One
    + std::ops::Add<Self, Output = Self>
    + std::ops::Sub<Self, Output = Self>
    + std::ops::AddAssign
{
    #[inline(always)]
    fn valid(&self) -> bool {
        *self != num_traits::bounds::UpperBounded::max_value()
    }
}

impl Cost for u32 {}
impl Cost for u64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_is_invalid() {
        assert!(0u32.valid());
        assert!(!u32::MAX.valid());
        assert!(!u64::MAX.valid());
    }
}
