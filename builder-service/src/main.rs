use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use builder_service::{
    app::App,
    config::{DEFAULT_LOG_FILTER, EnvVars},
    db::SupabaseStore,
    import::{ImportDefaults, decorate, parse_file},
    render::{self, RenderOptions},
};
use clap::{Args, Parser, Subcommand};
use maud::Markup;
use exam_utils::{codec, generation::ExamRequest, generation::validate_generation, stats};
use rand::{SeedableRng, rngs::StdRng};
use schema::{Exam, ExamDetails, QuestionFilter, QuestionId, QuestionUpdate, Target, Targets};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(version, about = "Build printable exams from the question bank")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload questions from a CSV or JSON file
    Import {
        file: PathBuf,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        review_status: Option<String>,
    },
    /// Draw a new exam and write it as HTML
    Generate(GenerateArgs),
    /// Show statistics for the question bank, or for one stored exam
    Stats {
        #[arg(long)]
        exam: Option<Uuid>,
        /// Also write the tables as HTML
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List stored exams, or re-export one with --open
    History {
        #[arg(long)]
        open: Option<Uuid>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        hide_ids: bool,
        #[arg(long)]
        no_answers: bool,
    },
    /// Show a single question by its unique id
    Lookup {
        unique_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Update the editable fields of a question
    Edit {
        id: String,
        #[command(flatten)]
        update: EditArgs,
    },
    /// Check every stored exam for duplicate questions and summary drift
    Validate,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    instructor: String,
    #[arg(long, default_value = "")]
    course: String,
    #[arg(long, default_value = "")]
    duration: String,
    #[arg(long, default_value = "")]
    instructions: String,
    /// Question type count, as `TYPE=N`; repeatable
    #[arg(long = "type", value_parser = parse_target)]
    types: Vec<Target>,
    /// Difficulty count, as `DIFFICULTY=N`; repeatable
    #[arg(long = "difficulty", value_parser = parse_target)]
    difficulties: Vec<Target>,
    /// Comma separated keywords
    #[arg(long, default_value = "")]
    keywords: String,
    #[arg(long, default_value = "")]
    chapter: String,
    #[arg(long, default_value = "")]
    review_status: String,
    /// Course filter for the question pool
    #[arg(long, default_value = "")]
    filter_course: String,
    #[arg(long)]
    shuffle_choices: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    hide_ids: bool,
    #[arg(long)]
    no_answers: bool,
    /// Output file; defaults to the sanitized title in the working directory
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    difficulty: Option<String>,
    #[arg(long)]
    keywords: Option<String>,
    #[arg(long)]
    answer_summary: Option<String>,
    #[arg(long)]
    detailed_explanation: Option<String>,
    #[arg(long)]
    instructor_notes: Option<String>,
    #[arg(long)]
    review_status: Option<String>,
}

fn parse_target(s: &str) -> Result<Target, String> {
    let (key, count) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected KEY=N, got '{s}'"))?;
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid count in '{s}': {e}"))?;
    Ok(Target::new(key.trim(), count))
}

fn render_options(hide_ids: bool, no_answers: bool) -> RenderOptions {
    RenderOptions {
        show_ids: !hide_ids,
        include_answers: !no_answers,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty())
        .with(sentry::integrations::tracing::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let env_vars = EnvVars::new();

    let _guard = if let Some(sentry_dsn) = env_vars.sentry_dsn.clone() {
        tracing::info!("initializing Sentry");
        // NOTE: Events are only emitted, once the guard goes out of scope.
        Some(sentry::init((
            sentry_dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(env_vars.environment.to_string().into()),
                traces_sample_rate: 1.0,
                ..Default::default()
            },
        )))
    } else {
        None
    };

    match run(cli.command, &env_vars).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, env_vars: &EnvVars) -> anyhow::Result<()> {
    let store = SupabaseStore::new(&env_vars.supabase_url, &env_vars.supabase_key);
    let mut app = App::new(store, env_vars.fetch_page_size, &env_vars.history_path).await;

    match command {
        Command::Import {
            file,
            course,
            review_status,
        } => {
            let questions = parse_file(&file).await?;
            let questions = decorate(questions, &ImportDefaults { course, review_status });
            let report = app.import(&questions, env_vars.import_batch_size).await?;
            println!(
                "Imported {} questions in {} batches.",
                report.questions, report.batches
            );
        }
        Command::Generate(args) => {
            let request = ExamRequest {
                details: ExamDetails {
                    title: args.title,
                    instructor: args.instructor,
                    course: args.course,
                    duration: args.duration,
                    instructions: args.instructions,
                },
                filters: QuestionFilter {
                    keywords: args.keywords,
                    chapter: args.chapter,
                    review_status: args.review_status,
                    course: args.filter_course,
                    limit: env_vars.question_limit,
                },
                targets: Targets {
                    by_type: args.types,
                    by_difficulty: args.difficulties,
                },
                shuffle_choices: args.shuffle_choices,
            };
            let mut rng = match args.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let generation = app.generate(&request, &mut rng).await?;
            for s in &generation.shortfalls {
                println!(
                    "Only {} of {} requested '{}' questions were available.",
                    s.available, s.requested, s.key
                );
            }
            let options = render_options(args.hide_ids, args.no_answers);
            let path = write_exam(&generation.exam, options, args.out).await?;
            println!(
                "Exam {} with {} questions written to {}",
                generation.exam.id,
                generation.exam.questions.len(),
                path.display()
            );
        }
        Command::Stats { exam: Some(id), out } => {
            let exam = app.reopen(&id)?.clone();
            let stats = app.exam_stats().context("no current exam")?;
            println!("{}  {}", exam.details.title, render::format_date(&exam.generated_at));
            println!(
                "Questions: {}  Unique: {}  Repeated: {}",
                stats.total, stats.unique, stats.repeated
            );
            print_counts("By question type", &stats.by_type, stats.total);
            print_counts("By difficulty", &stats.by_difficulty, stats.total);
            if let Some(path) = out {
                let html = render::page("Exam statistics", render::render_exam_stats(&exam, &stats));
                write_html(&path, html).await?;
            }
        }
        Command::Stats { exam: None, out } => {
            app.refresh().await?;
            let stats = app.global_stats();
            if stats.total == 0 {
                println!("No data yet. Import questions or check your Supabase configuration.");
                return Ok(());
            }
            println!("Total questions: {}", stats.total);
            println!("Question types: {}", app.types().join(", "));
            println!("Difficulties: {}", app.difficulties().join(", "));
            println!("Repeated IDs: {}", stats.repeated_ids);
            print_counts("By course", &stats.by_course, stats.total);
            print_counts("By question type", &stats.by_type, stats.total);
            print_counts("By difficulty", &stats.by_difficulty, stats.total);
            if let Some(path) = out {
                let html = render::page("Question bank statistics", render::render_corpus_stats(&stats));
                write_html(&path, html).await?;
            }
        }
        Command::History {
            open,
            out,
            hide_ids,
            no_answers,
        } => match open {
            Some(id) => {
                let exam = app.reopen(&id)?.clone();
                let path = write_exam(&exam, render_options(hide_ids, no_answers), out).await?;
                println!("Exam {id} written to {}", path.display());
            }
            None if app.history().entries().is_empty() => println!("No exams generated yet."),
            None => {
                for exam in app.history().entries() {
                    println!(
                        "{}  {}  {:>3} questions  {}",
                        exam.id,
                        render::format_date(&exam.generated_at),
                        exam.questions.len(),
                        exam.details.title
                    );
                }
            }
        },
        Command::Lookup { unique_id, out } => match app.lookup(&unique_id).await? {
            Some(q) => {
                if let Some(path) = out {
                    let html = render::page(&unique_id, render::render_question_detail(&q));
                    write_html(&path, html).await?;
                }
                println!("{}", q.display_id().unwrap_or_default());
                println!("{}", q.question_text.as_deref().unwrap_or_default());
                println!(
                    "Correct answer: {}",
                    codec::format_correct_answer(q.correct_answer.as_ref())
                );
                println!("Difficulty: {}", q.difficulty.as_deref().unwrap_or("—"));
                println!("Review status: {}", q.review_status.as_deref().unwrap_or("—"));
                println!("Keywords: {}", q.keywords.as_deref().unwrap_or("—"));
            }
            None => println!("No question found for ID {unique_id}."),
        },
        Command::Edit { id, update } => {
            let update = QuestionUpdate {
                difficulty: update.difficulty,
                keywords: update.keywords,
                answer_summary: update.answer_summary,
                detailed_explanation: update.detailed_explanation,
                instructor_notes: update.instructor_notes,
                review_status: update.review_status,
            };
            let id = QuestionId::from(id.as_str());
            app.edit_question(&id, &update).await?;
            println!("Question {id} updated.");
        }
        Command::Validate => {
            let mut failures = 0;
            for exam in app.history().entries() {
                if let Err(e) = validate_generation(exam) {
                    failures += 1;
                    println!("{}  {}: {e}", exam.id, exam.details.title);
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} stored exams failed validation");
            }
            println!("All {} stored exams are valid.", app.history().entries().len());
        }
    }
    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>, total: usize) {
    println!("\n{title}");
    for (key, count) in stats::sorted_counts(counts) {
        println!("  {key:<24} {count:>6} {:>6.1}%", stats::percentage(count, total));
    }
}

async fn write_html(path: &Path, html: Markup) -> anyhow::Result<()> {
    tokio::fs::write(path, html.into_string())
        .await
        .with_context(|| format!("unable to write {}", path.display()))
}

async fn write_exam(exam: &Exam, options: RenderOptions, out: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match out {
        Some(path) => {
            write_html(&path, render::render_exam(exam, options)).await?;
            Ok(path)
        }
        None => render::export_exam(exam, options, ".").await,
    }
}
