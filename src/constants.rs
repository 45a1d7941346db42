pub mod limits {

    /// Cap on entries returned by the insulin log history endpoint.
    pub const RECENT_INSULIN_LOGS: u64 = 10;
}
