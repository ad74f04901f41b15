// Section builders for the markdown MM report
//
// Each function builds one section of the report. Sections carry
// Result<String, SectionError> so a skipped or empty stage renders as a
// "Data Unavailable" block instead of failing the whole document.

use super::formatter;
use super::{MMReport, ReportStage};
use crate::orderbook::analytics::{PatternEvent, PatternEvidence};
use crate::orderbook::types::BookSide;

/// Maximum pattern events listed individually per section
const MAX_LISTED_EVENTS: usize = 20;

/// A single report section
#[derive(Debug, Clone)]
pub(crate) struct ReportSection {
    pub title: String,
    pub content: Result<String, SectionError>,
}

impl ReportSection {
    fn new(title: &str, content: Result<String, SectionError>) -> Self {
        Self {
            title: title.to_string(),
            content,
        }
    }

    pub fn render(&self) -> String {
        match &self.content {
            Ok(markdown) => markdown.clone(),
            Err(err) => self.render_error(err),
        }
    }

    fn render_error(&self, err: &SectionError) -> String {
        format!(
            "## {}\n\n**[Data Unavailable]**\n\n{}\n\n",
            self.title,
            err.user_message()
        )
    }
}

/// Reasons a section has no content
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SectionError {
    /// Stage did not run before the evaluation deadline
    StageSkipped(ReportStage),
    InsufficientData(String),
}

impl SectionError {
    pub fn user_message(&self) -> String {
        match self {
            SectionError::StageSkipped(stage) => format!(
                "The {} stage was skipped because the evaluation ran past its deadline.",
                stage.as_str()
            ),
            SectionError::InsufficientData(what) => {
                format!("Not enough data in the window to compute {}.", what)
            }
        }
    }
}

/// Render every section of a report into one markdown document
pub fn render_report(report: &MMReport) -> String {
    let sections = [
        build_header_section(report),
        build_liquidity_section(report),
        build_depth_section(report),
        build_patterns_section(report),
        build_trade_flow_section(report),
        build_diagnostics_section(report),
    ];

    sections.iter().map(ReportSection::render).collect()
}

fn stage_ran(report: &MMReport, stage: ReportStage) -> Result<(), SectionError> {
    if report.diagnostics.skipped_stages.contains(&stage) {
        return Err(SectionError::StageSkipped(stage));
    }
    Ok(())
}

pub(crate) fn build_header_section(report: &MMReport) -> ReportSection {
    let mut content = formatter::build_section_header(
        &format!("MM Report: {} on {}", report.instrument, report.venue),
        1,
    );

    let headers = ["Metric", "Value"];
    let mut rows = vec![
        vec!["Report ID".to_string(), report.report_id.to_string()],
        vec![
            "Generated At".to_string(),
            formatter::format_datetime(report.generated_at),
        ],
        vec![
            "Window".to_string(),
            format!(
                "{} to {}",
                formatter::format_datetime(report.window.start),
                formatter::format_datetime(report.window.end)
            ),
        ],
        vec![
            "MM Probability".to_string(),
            formatter::format_score(report.mm_probability_score),
        ],
        vec![
            "Liquidity Score".to_string(),
            formatter::format_score(report.liquidity.score),
        ],
    ];
    if report.diagnostics.degraded {
        rows.push(vec!["Status".to_string(), "Degraded".to_string()]);
    }

    content.push_str(&formatter::build_table(&headers, &rows));
    content.push('\n');

    ReportSection::new("MM Report", Ok(content))
}

pub(crate) fn build_liquidity_section(report: &MMReport) -> ReportSection {
    let content = stage_ran(report, ReportStage::Liquidity).and_then(|_| {
        let l = &report.liquidity;
        if l.snapshot_count == 0 {
            return Err(SectionError::InsufficientData(
                "liquidity statistics".to_string(),
            ));
        }

        let mut section = formatter::build_section_header("Liquidity", 2);
        let headers = ["Metric", "Value"];
        let rows = vec![
            vec!["Avg Spread".to_string(), formatter::format_bps(l.avg_spread_bps)],
            vec![
                "Spread Range".to_string(),
                format!(
                    "{} to {}",
                    formatter::format_bps(l.min_spread_bps),
                    formatter::format_bps(l.max_spread_bps)
                ),
            ],
            vec![
                "Spread Volatility".to_string(),
                formatter::format_bps(l.spread_volatility),
            ],
            vec![
                "Mean Imbalance".to_string(),
                format!("{:+.3} (std {:.3})", l.mean_imbalance, l.imbalance_std),
            ],
            vec![
                "Current Imbalance".to_string(),
                format!("{:+.3}", l.current_imbalance),
            ],
            vec!["Bid Depth within 1%".to_string(), format!("{:.4}", l.depth_1pct)],
            vec![
                "Presence".to_string(),
                formatter::format_percentage(l.presence_pct),
            ],
            vec!["Snapshots".to_string(), l.snapshot_count.to_string()],
        ];
        section.push_str(&formatter::build_table(&headers, &rows));
        section.push('\n');

        if !l.band_depths.is_empty() {
            section.push_str(&formatter::build_section_header("Mean Depth by Band", 3));
            let rows: Vec<Vec<String>> = l
                .band_depths
                .iter()
                .map(|b| {
                    vec![
                        format!("{}%", b.band_pct),
                        format!("{:.4}", b.mean_bid_volume),
                        format!("{:.4}", b.mean_ask_volume),
                    ]
                })
                .collect();
            section.push_str(&formatter::build_table(
                &["Band", "Mean Bid Volume", "Mean Ask Volume"],
                &rows,
            ));
            section.push('\n');
        }

        Ok(section)
    });

    ReportSection::new("Liquidity", content)
}

pub(crate) fn build_depth_section(report: &MMReport) -> ReportSection {
    let content = stage_ran(report, ReportStage::Depth).and_then(|_| {
        let metric = report
            .latest_depth()
            .ok_or_else(|| SectionError::InsufficientData("order book depth".to_string()))?;

        let mut section = formatter::build_section_header("Latest Depth", 2);
        section.push_str(&format!(
            "As of {}\n\n",
            formatter::format_datetime(metric.computed_at)
        ));

        let rows: Vec<Vec<String>> = metric
            .bands
            .iter()
            .map(|b| {
                vec![
                    format!("{}%", b.band_pct),
                    b.bid_volume.normalize().to_string(),
                    b.ask_volume.normalize().to_string(),
                ]
            })
            .collect();
        section.push_str(&formatter::build_table(
            &["Band", "Bid Volume", "Ask Volume"],
            &rows,
        ));
        section.push('\n');

        Ok(section)
    });

    ReportSection::new("Latest Depth", content)
}

pub(crate) fn build_patterns_section(report: &MMReport) -> ReportSection {
    let content = stage_ran(report, ReportStage::Patterns).map(|_| {
        let counts = &report.pattern_counts;
        let mut section = formatter::build_section_header("Order Book Patterns", 2);

        let rows = vec![
            vec!["Round Number".to_string(), counts.round_number.to_string()],
            vec!["Symmetric Pair".to_string(), counts.symmetric.to_string()],
            vec!["Order Wall".to_string(), counts.wall.to_string()],
            vec![
                "Rapid Disappearance".to_string(),
                counts.rapid_change.to_string(),
            ],
            vec![
                "Persistent Level".to_string(),
                counts.persistent_level.to_string(),
            ],
        ];
        section.push_str(&formatter::build_table(&["Pattern", "Count"], &rows));
        section.push('\n');
        section.push_str(&event_list(&report.pattern_events));

        section
    });

    ReportSection::new("Order Book Patterns", content)
}

pub(crate) fn build_trade_flow_section(report: &MMReport) -> ReportSection {
    let content = stage_ran(report, ReportStage::TradeFlow).and_then(|_| {
        if report.diagnostics.trades_used == 0 {
            return Err(SectionError::InsufficientData("trade flow".to_string()));
        }

        let mut section = formatter::build_section_header("Trade Flow", 2);
        section.push_str(&format!(
            "{} trades analysed, {} ping-pong windows, {} size clusters\n\n",
            report.diagnostics.trades_used,
            report.pattern_counts.ping_pong,
            report.pattern_counts.size_cluster
        ));
        section.push_str(&event_list(&report.trade_flow));

        Ok(section)
    });

    ReportSection::new("Trade Flow", content)
}

pub(crate) fn build_diagnostics_section(report: &MMReport) -> ReportSection {
    let d = &report.diagnostics;
    let mut section = formatter::build_section_header("Diagnostics", 2);

    let rows = vec![
        vec![
            "Snapshots".to_string(),
            format!("{} of {} used", d.snapshots_used, d.snapshots_received),
        ],
        vec![
            "Excluded Snapshots".to_string(),
            format!(
                "{} crossed, {} malformed, {} outside window",
                d.crossed_snapshots, d.malformed_snapshots, d.snapshots_outside_window
            ),
        ],
        vec![
            "Trades".to_string(),
            format!("{} of {} used", d.trades_used, d.trades_received),
        ],
        vec![
            "Excluded Trades".to_string(),
            format!(
                "{} malformed, {} outside lookback",
                d.malformed_trades, d.trades_outside_lookback
            ),
        ],
        vec![
            "Skipped Snapshot Pairs".to_string(),
            d.skipped_snapshot_pairs.to_string(),
        ],
    ];
    section.push_str(&formatter::build_table(&["Check", "Result"], &rows));
    section.push('\n');

    let mut notes: Vec<String> = d.insufficient_data.clone();
    if !d.skipped_stages.is_empty() {
        let skipped: Vec<&str> = d.skipped_stages.iter().map(ReportStage::as_str).collect();
        notes.push(format!("skipped stages: {}", skipped.join(", ")));
    }
    if !notes.is_empty() {
        section.push_str(&formatter::build_list(&notes, false));
        section.push('\n');
    }

    ReportSection::new("Diagnostics", Ok(section))
}

fn event_list(events: &[PatternEvent]) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut items: Vec<String> = events
        .iter()
        .take(MAX_LISTED_EVENTS)
        .map(describe_event)
        .collect();
    if events.len() > MAX_LISTED_EVENTS {
        items.push(format!("... {} more", events.len() - MAX_LISTED_EVENTS));
    }

    let mut list = formatter::build_list(&items, false);
    list.push('\n');
    list
}

fn side_label(side: BookSide) -> &'static str {
    match side {
        BookSide::Bid => "bid",
        BookSide::Ask => "ask",
    }
}

fn describe_event(event: &PatternEvent) -> String {
    let at = event.detected_at.format("%H:%M:%S");
    let detail = match &event.evidence {
        PatternEvidence::RoundNumber {
            side,
            price,
            volume,
            multiple,
        } => format!(
            "{} {} @ {} (multiple of {})",
            side_label(*side),
            volume.normalize(),
            formatter::format_price(*price),
            multiple
        ),
        PatternEvidence::SymmetricPair {
            volume,
            bid_price,
            ask_price,
            spread,
        } => format!(
            "{} quoted at {} / {} (spread {})",
            volume.normalize(),
            formatter::format_price(*bid_price),
            formatter::format_price(*ask_price),
            spread.normalize()
        ),
        PatternEvidence::OrderWall {
            side,
            price,
            volume,
            volume_ratio,
        } => format!(
            "{} {} @ {} ({:.1}x mean)",
            side_label(*side),
            volume.normalize(),
            formatter::format_price(*price),
            volume_ratio
        ),
        PatternEvidence::RapidDisappearance {
            side,
            price,
            volume,
            duration_seconds,
        } => format!(
            "{} {} @ {} pulled within {:.0}s",
            side_label(*side),
            volume.normalize(),
            formatter::format_price(*price),
            duration_seconds
        ),
        PatternEvidence::PersistentLevel {
            side,
            price,
            volume,
            duration_seconds,
            snapshot_count,
        } => format!(
            "{} {} @ {} held {:.0}s over {} snapshots",
            side_label(*side),
            volume.normalize(),
            formatter::format_price(*price),
            duration_seconds,
            snapshot_count
        ),
        PatternEvidence::PingPong {
            avg_buy_price,
            avg_sell_price,
            trade_count,
            ..
        } => format!(
            "{} trades, avg buy {:.2} vs avg sell {:.2}",
            trade_count, avg_buy_price, avg_sell_price
        ),
        PatternEvidence::SizeCluster {
            size,
            frequency,
            percentage,
        } => format!(
            "size {} traded {} times ({})",
            size.normalize(),
            frequency,
            formatter::format_percentage(*percentage)
        ),
    };

    format!("{} `{}` {}", at, event.kind.as_str(), detail)
}
