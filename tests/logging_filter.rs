use opgraph::cli::LogLevel;
use opgraph::logging::build_filter;
use tracing::level_filters::LevelFilter;

#[test]
fn test_cli_level_sets_global_max() {
    for (lvl, expected) in [
        (LogLevel::Error, LevelFilter::ERROR),
        (LogLevel::Warn, LevelFilter::WARN),
        (LogLevel::Debug, LevelFilter::DEBUG),
        (LogLevel::Trace, LevelFilter::TRACE),
    ] {
        assert_eq!(build_filter(Some(lvl)).max_level_hint(), Some(expected));
    }
}
