mod display;
mod import;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use fenetre_core::backtest::{backtest_trend_window, backtest_window, BacktestConfig};
use fenetre_core::drift::{drift_analysis, drift_trend_analysis};
use fenetre_core::score::{trend_labels, Scorer};
use fenetre_core::search::{
    propose_trend_window, propose_window, SearchBounds, SearchConfig, ThresholdProfile,
    TrendSearchConfig,
};
use fenetre_core::series::DrawSeries;
use fenetre_db::db::{count_draws, db_path, fetch_last_draws, migrate, open_db};
use fenetre_db::models::Pool;
use fenetre_db::rusqlite::Connection;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ScorerArg {
    #[default]
    Frequency,
    Absence,
    Zscore,
}

impl From<ScorerArg> for Scorer {
    fn from(arg: ScorerArg) -> Self {
        match arg {
            ScorerArg::Frequency => Scorer::Frequency,
            ScorerArg::Absence => Scorer::Absence,
            ScorerArg::Zscore => Scorer::OverRepresentation,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum AnalysisArg {
    #[default]
    Frequency,
    Absence,
    Zscore,
    Trend,
}

impl AnalysisArg {
    fn scorer(self) -> Option<Scorer> {
        match self {
            AnalysisArg::Frequency => Some(Scorer::Frequency),
            AnalysisArg::Absence => Some(Scorer::Absence),
            AnalysisArg::Zscore => Some(Scorer::OverRepresentation),
            AnalysisArg::Trend => None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum PoolArg {
    Balls,
    Stars,
    #[default]
    Both,
}

impl PoolArg {
    fn pools(self) -> Vec<Pool> {
        match self {
            PoolArg::Balls => vec![Pool::Balls],
            PoolArg::Stars => vec![Pool::Stars],
            PoolArg::Both => vec![Pool::Balls, Pool::Stars],
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ProfileArg {
    Strict,
    #[default]
    Standard,
    Souple,
}

#[derive(Debug, Clone, Args)]
struct ProfileOpts {
    /// Profil de seuils
    #[arg(long, value_enum, default_value = "standard")]
    profile: ProfileArg,

    /// Remplace le ρ minimal du profil
    #[arg(long)]
    min_rho: Option<f64>,

    /// Remplace le recouvrement top-K minimal du profil
    #[arg(long)]
    min_overlap: Option<f64>,

    /// Remplace la concordance minimale du profil
    #[arg(long)]
    min_concordance: Option<f64>,

    /// Remplace le nombre de candidats valides consécutifs requis
    #[arg(long)]
    consecutive: Option<usize>,
}

impl ProfileOpts {
    fn build(&self) -> ThresholdProfile {
        let mut profile = match self.profile {
            ProfileArg::Strict => ThresholdProfile::strict(),
            ProfileArg::Standard => ThresholdProfile::standard(),
            ProfileArg::Souple => ThresholdProfile::soft(),
        };
        if let Some(v) = self.min_rho {
            profile.min_rho = v;
        }
        if let Some(v) = self.min_overlap {
            profile.min_overlap = v;
        }
        if let Some(v) = self.min_concordance {
            profile.min_concordance = v;
        }
        if let Some(v) = self.consecutive {
            profile.consecutive_required = v;
        }
        profile
    }
}

#[derive(Parser)]
#[command(name = "fenetre", about = "Analyse de stabilité des fenêtres EuroMillions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier CSV
    Import {
        /// Chemin vers le fichier CSV
        #[arg(short, long, default_value = "assets/euromillions.csv")]
        file: PathBuf,
    },

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Tables de scores par numéro sur une fenêtre donnée
    Scores {
        /// Fenêtre d'analyse (nombre de tirages)
        #[arg(short, long, default_value = "100")]
        window: usize,

        /// Fenêtre courte R pour la colonne tendance
        #[arg(short, long, default_value = "25")]
        recent: usize,
    },

    /// Chercher la plus petite fenêtre stable pour un score de classement
    Propose {
        /// Variante de score
        #[arg(short, long, value_enum, default_value = "frequency")]
        scorer: ScorerArg,

        /// Pools devant passer simultanément
        #[arg(long, value_enum, default_value = "both")]
        pool: PoolArg,

        /// Borne basse du balayage
        #[arg(long, default_value = "50")]
        min: usize,

        /// Borne haute du balayage
        #[arg(long, default_value = "400")]
        max: usize,

        /// Pas du balayage
        #[arg(long, default_value = "25")]
        step: usize,

        /// Incrément de comparaison Δ
        #[arg(long, default_value = "25")]
        delta: usize,

        /// Taille du top-K comparé
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        #[command(flatten)]
        profile: ProfileOpts,

        /// Export JSON du résultat
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chercher le couple (W, R) stable pour la carte de tendances
    Trend {
        /// Pools devant passer simultanément
        #[arg(long, value_enum, default_value = "both")]
        pool: PoolArg,

        /// Borne basse du balayage de W
        #[arg(long, default_value = "100")]
        min: usize,

        /// Borne haute du balayage de W
        #[arg(long, default_value = "400")]
        max: usize,

        /// Pas du balayage de W
        #[arg(long, default_value = "50")]
        step: usize,

        /// Départ du balayage de R
        #[arg(long, default_value = "10")]
        recent_min: usize,

        /// Pas du balayage de R
        #[arg(long, default_value = "10")]
        recent_step: usize,

        /// Décalage δ de comparaison des étiquettes
        #[arg(long, default_value = "10")]
        delta: usize,

        #[command(flatten)]
        profile: ProfileOpts,

        /// Export JSON du résultat
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Valider une fenêtre proposée sur tout l'historique
    Backtest {
        /// Variante analysée
        #[arg(short, long, value_enum, default_value = "frequency")]
        scorer: AnalysisArg,

        /// Pools devant passer simultanément
        #[arg(long, value_enum, default_value = "both")]
        pool: PoolArg,

        /// Largeur de fenêtre à valider (W pour la tendance)
        #[arg(short, long)]
        window: usize,

        /// Fenêtre courte R (tendance uniquement)
        #[arg(short, long)]
        recent: Option<usize>,

        /// Incrément de comparaison Δ (δ pour la tendance)
        #[arg(long, default_value = "25")]
        delta: usize,

        /// Pas de glissement de la fenêtre
        #[arg(long, default_value = "10")]
        step: usize,

        /// Taille du top-K comparé
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        #[command(flatten)]
        profile: ProfileOpts,

        /// Export JSON du rapport
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stabilité de la proposition dans le temps (recherche par époques)
    Drift {
        /// Variante analysée
        #[arg(short, long, value_enum, default_value = "frequency")]
        scorer: AnalysisArg,

        /// Pools devant passer simultanément
        #[arg(long, value_enum, default_value = "both")]
        pool: PoolArg,

        /// Borne basse du balayage
        #[arg(long, default_value = "50")]
        min: usize,

        /// Borne haute du balayage
        #[arg(long, default_value = "400")]
        max: usize,

        /// Pas du balayage
        #[arg(long, default_value = "25")]
        step: usize,

        /// Incrément de comparaison Δ (δ pour la tendance)
        #[arg(long, default_value = "25")]
        delta: usize,

        /// Taille du top-K comparé
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Départ du balayage de R (tendance uniquement)
        #[arg(long, default_value = "10")]
        recent_min: usize,

        /// Pas du balayage de R (tendance uniquement)
        #[arg(long, default_value = "10")]
        recent_step: usize,

        /// Tirages retirés par époque
        #[arg(long, default_value = "50")]
        truncation_step: usize,

        /// Longueur minimale de la queue (défaut : max + Δ)
        #[arg(long)]
        min_tail: Option<usize>,

        #[command(flatten)]
        profile: ProfileOpts,

        /// Export JSON du résultat
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file),
        Command::List { last } => cmd_list(&conn, last),
        Command::Scores { window, recent } => cmd_scores(&conn, window, recent),
        Command::Propose {
            scorer,
            pool,
            min,
            max,
            step,
            delta,
            top_k,
            profile,
            output,
        } => cmd_propose(
            &conn,
            scorer,
            pool,
            SearchBounds { min, max, step },
            delta,
            top_k,
            &profile,
            output,
        ),
        Command::Trend {
            pool,
            min,
            max,
            step,
            recent_min,
            recent_step,
            delta,
            profile,
            output,
        } => cmd_trend(
            &conn,
            pool,
            SearchBounds { min, max, step },
            recent_min,
            recent_step,
            delta,
            &profile,
            output,
        ),
        Command::Backtest {
            scorer,
            pool,
            window,
            recent,
            delta,
            step,
            top_k,
            profile,
            output,
        } => cmd_backtest(
            &conn, scorer, pool, window, recent, delta, step, top_k, &profile, output,
        ),
        Command::Drift {
            scorer,
            pool,
            min,
            max,
            step,
            delta,
            top_k,
            recent_min,
            recent_step,
            truncation_step,
            min_tail,
            profile,
            output,
        } => cmd_drift(
            &conn,
            scorer,
            pool,
            SearchBounds { min, max, step },
            delta,
            top_k,
            recent_min,
            recent_step,
            truncation_step,
            min_tail,
            &profile,
            output,
        ),
    }
}

fn load_series(conn: &Connection) -> Result<DrawSeries> {
    let n = count_draws(conn)?;
    if n == 0 {
        bail!("Base vide. Lancez d'abord : fenetre import");
    }
    let draws = fetch_last_draws(conn, n)?;
    Ok(DrawSeries::new(draws)?)
}

fn targets_for(scorer: Scorer, pool: PoolArg) -> Vec<(Scorer, Pool)> {
    pool.pools().into_iter().map(|p| (scorer, p)).collect()
}

fn sweep_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}",
        )
        .unwrap()
        .progress_chars("=> "),
    );
    pb
}

fn save_json<T: serde::Serialize>(value: &T, path: &PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    println!("Résultat sauvegardé dans : {}", path.display());
    Ok(())
}

fn cmd_import(conn: &Connection, file: &PathBuf) -> Result<()> {
    let result = import::import_csv(conn, file)?;
    display::display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        println!("Base vide. Lancez d'abord : fenetre import");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display::display_draws(&draws);
    Ok(())
}

fn cmd_scores(conn: &Connection, window: usize, recent: usize) -> Result<()> {
    if recent > window {
        bail!("R = {recent} ne peut pas dépasser la fenêtre {window}");
    }
    let series = load_series(conn)?;
    let draws = series.window(window)?;

    for pool in [Pool::Balls, Pool::Stars] {
        let frequency = Scorer::Frequency.score(draws, pool);
        let absence = Scorer::Absence.score(draws, pool);
        let zscore = Scorer::OverRepresentation.score(draws, pool);
        let trend = trend_labels(draws, pool, recent);
        display::display_score_table(pool, window, recent, &frequency, &absence, &zscore, &trend);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_propose(
    conn: &Connection,
    scorer: ScorerArg,
    pool: PoolArg,
    bounds: SearchBounds,
    delta: usize,
    top_k: usize,
    profile: &ProfileOpts,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = load_series(conn)?;
    let cfg = SearchConfig {
        bounds,
        delta,
        top_k,
        profile: profile.build(),
    };
    let targets = targets_for(scorer.into(), pool);
    let proposal = propose_window(&series, &targets, &cfg)?;
    display::display_proposal(&proposal);
    if let Some(path) = output {
        save_json(&proposal, &path)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_trend(
    conn: &Connection,
    pool: PoolArg,
    bounds: SearchBounds,
    recent_min: usize,
    recent_step: usize,
    delta: usize,
    profile: &ProfileOpts,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = load_series(conn)?;
    let cfg = TrendSearchConfig {
        bounds,
        recent_min,
        recent_step,
        delta,
        profile: profile.build(),
    };
    let proposal = propose_trend_window(&series, &pool.pools(), &cfg)?;
    display::display_trend_proposal(&proposal);
    if let Some(path) = output {
        save_json(&proposal, &path)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_backtest(
    conn: &Connection,
    scorer: AnalysisArg,
    pool: PoolArg,
    window: usize,
    recent: Option<usize>,
    delta: usize,
    step: usize,
    top_k: usize,
    profile: &ProfileOpts,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = load_series(conn)?;
    let cfg = BacktestConfig {
        delta,
        step,
        top_k,
        profile: profile.build(),
    };
    let pb = sweep_progress_bar();
    let progress = |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    };

    match scorer.scorer() {
        Some(scorer) => {
            let targets = targets_for(scorer, pool);
            let report = backtest_window(&series, &targets, window, &cfg, Some(&progress))?;
            pb.finish_and_clear();
            display::display_backtest(&report);
            if let Some(path) = output {
                save_json(&report, &path)?;
            }
        }
        None => {
            let recent = match recent {
                Some(r) => r,
                None => bail!("--recent est requis pour le backtest de tendance"),
            };
            let report = backtest_trend_window(
                &series,
                &pool.pools(),
                window,
                recent,
                &cfg,
                Some(&progress),
            )?;
            pb.finish_and_clear();
            display::display_trend_backtest(&report);
            if let Some(path) = output {
                save_json(&report, &path)?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_drift(
    conn: &Connection,
    scorer: AnalysisArg,
    pool: PoolArg,
    bounds: SearchBounds,
    delta: usize,
    top_k: usize,
    recent_min: usize,
    recent_step: usize,
    truncation_step: usize,
    min_tail: Option<usize>,
    profile: &ProfileOpts,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = load_series(conn)?;
    let min_tail = min_tail.unwrap_or(bounds.max + delta);
    let pb = sweep_progress_bar();
    let progress = |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    };

    match scorer.scorer() {
        Some(scorer) => {
            let cfg = SearchConfig {
                bounds,
                delta,
                top_k,
                profile: profile.build(),
            };
            let targets = targets_for(scorer, pool);
            let drift = drift_analysis(
                &series,
                &targets,
                &cfg,
                truncation_step,
                min_tail,
                Some(&progress),
            )?;
            pb.finish_and_clear();
            display::display_drift(&drift);
            if let Some(path) = output {
                save_json(&drift, &path)?;
            }
        }
        None => {
            let cfg = TrendSearchConfig {
                bounds,
                recent_min,
                recent_step,
                delta,
                profile: profile.build(),
            };
            let drift = drift_trend_analysis(
                &series,
                &pool.pools(),
                &cfg,
                truncation_step,
                min_tail,
                Some(&progress),
            )?;
            pb.finish_and_clear();
            display::display_trend_drift(&drift);
            if let Some(path) = output {
                save_json(&drift, &path)?;
            }
        }
    }
    Ok(())
}
