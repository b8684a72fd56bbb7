use std::time::Duration;

use signal_scraper::{extract, extract_with_options, Options, ReductionMode, SelectorConfig, Tier};

const URL: &str = "https://www.mql5.com/en/signals/9";

const PAGE: &str = r#"<html><head><title>t</title></head><body>
    <div class="ad-slot">AD_MARKER</div>
    <div class="s-signal-header"><h1 class="s-signal-header__name">Gamma</h1></div>
    <div id="history"><table>
        <tr><th>Symbol</th><th>Lots</th></tr>
        <tr><td>USDJPY</td><td>1.00</td></tr>
    </table></div>
</body></html>"#;

#[test]
fn options_default_values_are_sensible() {
    let options = Options::default();
    assert!(options.cache_enabled);
    assert_eq!(options.default_tier, Tier::Normal);
    assert_eq!(options.reduction_mode, ReductionMode::Keep);
    assert!(options.reduction_fallback);
    assert_eq!(options.render_timeout, Duration::from_secs(10));
    assert!(options.result_cache_ttl.is_none());
    assert!(options.chrome_executable.is_none());
}

#[test]
fn options_struct_update_syntax_overrides_selected_fields_only() {
    let options = Options {
        default_tier: Tier::Advanced,
        settle_delay: Duration::ZERO,
        ..Options::default()
    };

    assert_eq!(options.default_tier, Tier::Advanced);
    assert_eq!(options.settle_delay, Duration::ZERO);
    assert!(options.cache_enabled);
    assert_eq!(options.selectors, SelectorConfig::default());
}

#[test]
fn tier_names_parse_case_insensitively() {
    assert_eq!("FAST".parse::<Tier>().ok(), Some(Tier::Fast));
    assert_eq!(" normal ".parse::<Tier>().ok(), Some(Tier::Normal));
    assert_eq!("advanced".parse::<Tier>().ok(), Some(Tier::Advanced));
    assert!("turbo".parse::<Tier>().is_err());
    assert_eq!(Tier::Advanced.to_string(), "advanced");
}

#[test]
fn custom_selectors_redirect_extraction() {
    let mut selectors = SelectorConfig::default();
    selectors.keep.push("#history".to_string());
    selectors.trades.table = "#history table".to_string();

    let options = Options::default().with_selectors(selectors);
    let record = extract_with_options(PAGE, URL, &options).expect("expected Ok(_)");

    assert_eq!(record.trade_history.len(), 1);
    assert_eq!(record.trade_history[0].symbol, "USDJPY");
    assert_eq!(record.trade_history[0].volume, "1.00");

    // Default selectors do not see the table.
    let default_record = extract(PAGE, URL).expect("expected Ok(_)");
    assert!(default_record.trade_history.is_empty());
    assert_eq!(default_record.info("signalName"), "Gamma");
}

#[test]
fn remove_mode_uses_the_remove_list() {
    let mut selectors = SelectorConfig::default();
    selectors.remove.push(".ad-slot".to_string());
    let options = Options {
        reduction_mode: ReductionMode::Remove,
        ..Options::default().with_selectors(selectors)
    };

    let record = extract_with_options(PAGE, URL, &options).expect("expected Ok(_)");
    assert_eq!(record.meta.reduction, "remove");
    assert_eq!(record.info("signalName"), "Gamma");
}

#[test]
fn broken_keep_selector_falls_back_or_passes_through() {
    let mut selectors = SelectorConfig::default();
    selectors.keep.push("div[".to_string());

    let with_fallback = Options::default().with_selectors(selectors.clone());
    let record = extract_with_options(PAGE, URL, &with_fallback).expect("expected Ok(_)");
    assert_eq!(record.meta.reduction, "remove-fallback");
    assert_eq!(record.info("signalName"), "Gamma");

    let without_fallback = Options {
        reduction_fallback: false,
        ..Options::default().with_selectors(selectors)
    };
    let record = extract_with_options(PAGE, URL, &without_fallback).expect("expected Ok(_)");
    assert_eq!(record.meta.reduction, "original");
    assert_eq!(record.meta.processed_size_bytes, PAGE.len());
}

#[test]
fn selector_file_overrides_one_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("selectors.json");
    std::fs::write(&path, r#"{"chartNamespace": "Charts", "distribution": {"row": ".dist-row"}}"#)
        .expect("write selectors");

    let config = SelectorConfig::from_json_file(&path).expect("expected Ok(_)");
    assert_eq!(config.chart_namespace, "Charts");
    assert_eq!(config.distribution.row, ".dist-row");
    assert_eq!(config.distribution.symbol, ".signals-chart-dist__symbol");
    assert_eq!(config.keep, SelectorConfig::default().keep);
}
