quantity!(Percent, "%");

impl Percent {
    pub const HUNDRED: Self = Self(100.0);

    #[must_use]
    pub const fn to_proportion(self) -> f64 {
        0.01 * self.0
    }
}
