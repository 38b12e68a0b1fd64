use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    query::{PARAM_PAGE, PARAM_SEARCH, PARAM_SORT_BY, PARAM_SORT_ORDER},
    CourseApi, CourseClient, FetchOutcome, ListEvent, ListQueryController, UrlState,
};
use shared::{
    domain::{CourseId, CourseLevel},
    protocol::CourseSummary,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::{load_settings, DEFAULT_CONFIG_FILE};
use session::TokenStore;

#[derive(Parser, Debug)]
#[command(name = "coursefinder", about = "Search courses and manage ratings")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides the configured backend url.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one page of courses.
    Search {
        /// Shareable query string, e.g. "q=rust&page=2".
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        q: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        page: Option<String>,
        /// Client-side level filter: beginner, intermediate or advanced.
        #[arg(long)]
        level: Option<String>,
    },
    /// Show a course with its reviews and similar courses.
    Course { id: String },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Rate {
        id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        review: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config);
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    debug!(?settings, "loaded settings");

    let client = Arc::new(
        CourseClient::with_timeout(&settings.api_base_url, settings.request_timeout())
            .context("failed to build course client")?,
    );
    let tokens = TokenStore::new(&settings.token_file);

    match cli.command {
        Command::Search {
            url,
            q,
            sort_by,
            order,
            page,
            level,
        } => {
            let level = level
                .map(|raw| {
                    CourseLevel::parse(&raw).ok_or_else(|| anyhow!("unknown course level '{raw}'"))
                })
                .transpose()?;
            let mut url_state = UrlState::from_query_string(url.as_deref().unwrap_or_default());
            for (key, value) in [
                (PARAM_SEARCH, q),
                (PARAM_SORT_BY, sort_by),
                (PARAM_SORT_ORDER, order),
                (PARAM_PAGE, page),
            ] {
                if let Some(value) = value {
                    url_state.insert(key, &value);
                }
            }
            search(client, settings.page_size, &url_state, level).await?;
        }
        Command::Course { id } => show_course(&*client, &CourseId(id)).await?,
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            tokens.save(&session.token)?;
            println!("Signed in as {} <{}>", session.user.name, session.user.email);
        }
        Command::Logout => {
            client.logout().await;
            if tokens.clear()? {
                println!("Signed out");
            } else {
                println!("No stored session at {}", tokens.path().display());
            }
        }
        Command::Rate { id, rating, review } => {
            let Some(token) = tokens.load()? else {
                bail!("not signed in; run `coursefinder login` first");
            };
            client.restore_session(token).await;
            if let Err(err) = client
                .submit_rating(&CourseId(id.clone()), rating, review.as_deref())
                .await
            {
                if tokens.discard_if_rejected(&err)? {
                    bail!("stored session was rejected ({err}); run `coursefinder login` again");
                }
                return Err(err.into());
            }
            println!("Rated course {id} with {rating} star(s)");
        }
    }

    Ok(())
}

async fn search(
    client: Arc<CourseClient>,
    page_size: u32,
    url_state: &UrlState,
    level: Option<CourseLevel>,
) -> Result<()> {
    let base_url = client.base_url().clone();
    let controller = ListQueryController::initialize(client, page_size, url_state);
    let mut events = controller.subscribe_events();

    let outcome = controller.refresh().await;
    while let Ok(event) = events.try_recv() {
        debug!(?event, "list event");
        if let ListEvent::FetchFailed {
            message, retryable, ..
        } = event
        {
            let hint = if retryable {
                "; the backend looks busy or unreachable, try again shortly"
            } else {
                ""
            };
            bail!("failed to load courses from {base_url}: {message}{hint}");
        }
    }
    if outcome != FetchOutcome::Applied {
        bail!("course listing did not load ({outcome:?})");
    }

    let snapshot = controller.snapshot().await;
    let Some(page) = &snapshot.page else {
        bail!("course listing returned no page");
    };

    let filter_note = if snapshot.query.is_filtered() {
        format!(" for \"{}\"", snapshot.query.search_term())
    } else {
        String::new()
    };
    println!(
        "Found {} course{}{} (page {} of {}, sorted by {} {})",
        page.total_count,
        if page.total_count == 1 { "" } else { "s" },
        filter_note,
        page.page_number,
        page.total_pages.max(1),
        snapshot.query.sort_field(),
        snapshot.query.sort_direction(),
    );

    let items = controller.visible_items(level).await;
    if items.is_empty() {
        println!("No courses found. Try adjusting the search or filters.");
    }
    for course in &items {
        print_course_line(course);
    }

    let share = controller.current_url_representation().await;
    if snapshot.can_go_previous() {
        let previous = snapshot
            .query
            .with_page(page.page_number.saturating_sub(1))
            .to_url_state()
            .to_query_string();
        println!("previous: --url '{previous}'");
    }
    if snapshot.can_go_next() {
        let next = snapshot
            .query
            .with_page(page.page_number.saturating_add(1))
            .to_url_state()
            .to_query_string();
        println!("next:     --url '{next}'");
    }
    println!("share:    ?{}", share.to_query_string());
    Ok(())
}

fn print_course_line(course: &CourseSummary) {
    let level = course
        .course_levels
        .first()
        .map(|level| format!(" [{level}]"))
        .unwrap_or_default();
    println!(
        "  {} | {} | {} | {} ({} ratings){}",
        course.id, course.title, course.platform, course.rating_average, course.rating_count, level
    );
}

async fn show_course(api: &dyn CourseApi, course_id: &CourseId) -> Result<()> {
    let detail = api
        .get_course(course_id)
        .await
        .with_context(|| format!("failed to load course {course_id}"))?;
    let summary = &detail.summary;
    println!("{} ({})", summary.title, summary.platform);
    println!(
        "rating {} from {} reviews",
        summary.rating_average, summary.rating_count
    );
    if !summary.description.is_empty() {
        println!("\n{}", summary.description);
    }
    if let Some(url) = detail.platform_url.as_ref().or(summary.course_url.as_ref()) {
        println!("\n{url}");
    }
    for requirement in &detail.requirements {
        println!("  requires: {requirement}");
    }

    match api.list_reviews(course_id).await {
        Ok(reviews) if reviews.is_empty() => println!("\nNo reviews yet."),
        Ok(reviews) => {
            println!("\nReviews:");
            for review in reviews {
                println!(
                    "  {}/5 by {} on {}: {}",
                    review.rating,
                    review.user_name,
                    review.update_at,
                    review.review.as_deref().unwrap_or("-")
                );
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to load reviews"),
    }

    match api.similar_courses(course_id).await {
        Ok(similar) if !similar.is_empty() => {
            println!("\nSimilar courses:");
            for course in similar {
                println!(
                    "  {} | {} | {} ({} ratings)",
                    course.id, course.title, course.rating_average, course.rating_count
                );
            }
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "failed to load similar courses"),
    }

    Ok(())
}
