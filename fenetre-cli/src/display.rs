use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use textplots::{Chart, Plot, Shape};

use fenetre_core::backtest::{BacktestReport, TrendBacktestReport};
use fenetre_core::drift::{DriftSeries, TrendDriftSeries};
use fenetre_core::score::Trend;
use fenetre_core::search::{TrendProposal, WindowProposal};
use fenetre_db::models::{Draw, Pool};

use crate::import::ImportResult;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn valid_cell(valid: bool) -> Cell {
    if valid {
        Cell::new("✓").fg(Color::Green)
    } else {
        Cell::new("✗").fg(Color::Red)
    }
}

pub fn display_draws(draws: &[Draw]) {
    let mut table = new_table();
    table.set_header(vec!["Date", "Jour", "Boules", "Étoiles"]);

    for draw in draws {
        let mut sorted_balls = draw.balls;
        sorted_balls.sort();
        let mut sorted_stars = draw.stars;
        sorted_stars.sort();

        let balls_str = sorted_balls
            .iter()
            .map(|b| format!("{:2}", b))
            .collect::<Vec<_>>()
            .join(" - ");
        let stars_str = sorted_stars
            .iter()
            .map(|s| format!("{:2}", s))
            .collect::<Vec<_>>()
            .join(" - ");

        table.add_row(vec![&draw.date, &draw.day, &balls_str, &stars_str]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Lignes lues      : {}", result.total_records);
    println!("  Tirages insérés  : {}", result.inserted);
    println!("  Doublons ignorés : {}", result.skipped);
    println!("  Erreurs          : {}", result.errors);
}

/// Tableau des scores d'un pool : fréquence, retard, z-score et tendance
/// par numéro, sur la fenêtre demandée.
pub fn display_score_table(
    pool: Pool,
    window: usize,
    recent: usize,
    frequency: &[f64],
    absence: &[f64],
    zscore: &[f64],
    trend: &[Trend],
) {
    println!("\n── {} (fenêtre {}, R tendance {}) ──", pool, window, recent);

    let mut table = new_table();
    table.set_header(vec!["Numéro", "Fréquence", "Retard", "z-score", "Tendance"]);

    for i in 0..pool.size() {
        table.add_row(vec![
            format!("{}", i + 1),
            format!("{:.0}", frequency[i]),
            format!("{:.0}", absence[i]),
            format!("{:+.2}", zscore[i]),
            trend[i].to_string(),
        ]);
    }

    println!("{table}");
}

pub fn display_proposal(proposal: &WindowProposal) {
    println!(
        "\n== Recherche de fenêtre (profil {}, Δ={}, K={}) ==\n",
        proposal.profile, proposal.delta, proposal.top_k
    );

    let mut table = new_table();
    table.set_header(vec!["Fenêtre", "Score", "Pool", "ρ", "Top-K", "Valide"]);

    for candidate in &proposal.candidates {
        for pair in &candidate.pairs {
            table.add_row(vec![
                Cell::new(candidate.window),
                Cell::new(&pair.scorer),
                Cell::new(&pair.pool),
                Cell::new(format!("{:.3}", pair.metric.rho)),
                Cell::new(format!("{:.3}", pair.metric.overlap)),
                valid_cell(pair.valid),
            ]);
        }
    }

    println!("{table}");

    match proposal.window {
        Some(w) => println!("\nFenêtre proposée : {} tirages", w),
        None => println!("\nAucune fenêtre stable dans les bornes explorées."),
    }
}

pub fn display_trend_proposal(proposal: &TrendProposal) {
    println!(
        "\n== Recherche de fenêtres de tendance (profil {}, δ={}) ==\n",
        proposal.profile, proposal.delta
    );

    let mut table = new_table();
    table.set_header(vec!["W", "R", "Pool", "Conc. R/R+δ", "Conc. R+δ/R+2δ", "Valide"]);

    for candidate in &proposal.candidates {
        for pair in &candidate.pairs {
            table.add_row(vec![
                Cell::new(candidate.long_window),
                Cell::new(candidate.recent_window),
                Cell::new(&pair.pool),
                Cell::new(format!("{:.3}", pair.concordance_near)),
                Cell::new(format!("{:.3}", pair.concordance_far)),
                valid_cell(pair.valid),
            ]);
        }
    }

    println!("{table}");

    match proposal.windows {
        Some((w, r)) => println!("\nFenêtres proposées : W={} / R={}", w, r),
        None => println!("\nAucun couple (W, R) stable dans les bornes explorées."),
    }
}

pub fn display_backtest(report: &BacktestReport) {
    println!(
        "\n== Backtest fenêtre {} (profil {}, Δ={}, pas={}) ==\n",
        report.window, report.profile, report.delta, report.step
    );

    let mut table = new_table();
    table.set_header(vec!["Position", "Date fin", "ρ min", "Top-K min", "Valide"]);

    for position in &report.positions {
        let rho_min = position
            .pairs
            .iter()
            .map(|p| p.metric.rho)
            .fold(f64::INFINITY, f64::min);
        let overlap_min = position
            .pairs
            .iter()
            .map(|p| p.metric.overlap)
            .fold(f64::INFINITY, f64::min);
        table.add_row(vec![
            Cell::new(position.offset),
            Cell::new(&position.window_end_date),
            Cell::new(format!("{:.3}", rho_min)),
            Cell::new(format!("{:.3}", overlap_min)),
            valid_cell(position.valid),
        ]);
    }

    println!("{table}");

    display_metric_chart(
        "ρ minimal par position",
        report
            .positions
            .iter()
            .map(|p| {
                (
                    p.offset as f32,
                    p.pairs
                        .iter()
                        .map(|pair| pair.metric.rho)
                        .fold(f64::INFINITY, f64::min) as f32,
                )
            })
            .collect(),
    );

    println!(
        "\nTaux de réussite : {}/{} positions ({:.1} %)",
        report.valid_positions,
        report.total_positions,
        report.pass_rate * 100.0
    );
}

pub fn display_trend_backtest(report: &TrendBacktestReport) {
    println!(
        "\n== Backtest tendance W={} / R={} (profil {}, δ={}, pas={}) ==\n",
        report.long_window, report.recent_window, report.profile, report.delta, report.step
    );

    let mut table = new_table();
    table.set_header(vec!["Position", "Date fin", "Concordance min", "Valide"]);

    for position in &report.positions {
        let concordance_min = position
            .pairs
            .iter()
            .map(|p| p.concordance_near.min(p.concordance_far))
            .fold(f64::INFINITY, f64::min);
        table.add_row(vec![
            Cell::new(position.offset),
            Cell::new(&position.window_end_date),
            Cell::new(format!("{:.3}", concordance_min)),
            valid_cell(position.valid),
        ]);
    }

    println!("{table}");

    println!(
        "\nTaux de réussite : {}/{} positions ({:.1} %)",
        report.valid_positions,
        report.total_positions,
        report.pass_rate * 100.0
    );
}

pub fn display_drift(drift: &DriftSeries) {
    println!(
        "\n== Dérive de la fenêtre proposée (profil {}, troncature par {}) ==\n",
        drift.profile, drift.truncation_step
    );

    let mut table = new_table();
    table.set_header(vec!["Tirages retirés", "Fin d'époque", "Proposition"]);

    for epoch in &drift.epochs {
        let proposal = match epoch.proposal {
            Some(w) => w.to_string(),
            None => "—".to_string(),
        };
        table.add_row(vec![
            epoch.offset.to_string(),
            epoch.epoch_end_date.clone(),
            proposal,
        ]);
    }

    println!("{table}");

    display_metric_chart(
        "Proposition par époque",
        drift
            .epochs
            .iter()
            .filter_map(|e| e.proposal.map(|w| (e.offset as f32, w as f32)))
            .collect(),
    );
}

pub fn display_trend_drift(drift: &TrendDriftSeries) {
    println!(
        "\n== Dérive des fenêtres de tendance (profil {}, troncature par {}) ==\n",
        drift.profile, drift.truncation_step
    );

    let mut table = new_table();
    table.set_header(vec!["Tirages retirés", "Fin d'époque", "W", "R"]);

    for epoch in &drift.epochs {
        let (w, r) = match epoch.proposal {
            Some((w, r)) => (w.to_string(), r.to_string()),
            None => ("—".to_string(), "—".to_string()),
        };
        table.add_row(vec![
            epoch.offset.to_string(),
            epoch.epoch_end_date.clone(),
            w,
            r,
        ]);
    }

    println!("{table}");
}

fn display_metric_chart(title: &str, points: Vec<(f32, f32)>) {
    if points.len() < 2 {
        return;
    }
    let x_min = points.first().map(|p| p.0).unwrap_or(0.0);
    let x_max = points.last().map(|p| p.0).unwrap_or(1.0);
    if x_max <= x_min {
        return;
    }
    println!("\n  {title} :");
    let shape = Shape::Points(&points);
    let mut chart = Chart::new(120, 40, x_min, x_max);
    println!("{}", chart.lineplot(&shape));
}
