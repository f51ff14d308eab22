use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pdf_gallery::capabilities::Capabilities;
use pdf_gallery::embed::{EmbedTrigger, HeightReporter};
use pdf_gallery::gallery::{Gallery, GalleryItem, JsonFileBackend};
use pdf_gallery::panic_handler;
use pdf_gallery::pdf::{
    PageBox, PageSlot, Point, PointerKind, RenderEngine, RenderSession, SessionEvent,
};
use pdf_gallery::ratings::{Rating, RatingsClient};
use pdf_gallery::settings;

const LOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "pdf-gallery", version, about = "Render, zoom and rate gallery documents")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log file
    #[arg(long, global = true, default_value = "pdf-gallery.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Force the pro variant for this run
    #[arg(long, global = true, conflicts_with = "free")]
    pro: bool,

    /// Force the free variant for this run
    #[arg(long, global = true)]
    free: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rasterize every page to PNG
    Render {
        url: String,
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Print host height messages while rendering
        #[arg(long)]
        embed: bool,
    },
    /// Render the zoom overlay for a click on a page
    Zoom {
        url: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Click position as a fraction of page width
        #[arg(long, default_value_t = 0.5)]
        x: f32,
        /// Click position as a fraction of page height
        #[arg(long, default_value_t = 0.5)]
        y: f32,
        #[arg(long, default_value = "zoom.png")]
        out: PathBuf,
    },
    /// Show the rating summary of a document
    Rating { document_id: String },
    /// Rate a document from 1 to 5 stars, 0 removes the rating
    Rate { document_id: String, stars: u8 },
    #[command(subcommand)]
    Gallery(GalleryCommand),
}

#[derive(Subcommand)]
enum GalleryCommand {
    List,
    Add {
        title: String,
        url: String,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        id: String,
    },
    Move {
        id: String,
        index: usize,
    },
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();
    let cli = Cli::parse();

    let level = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {:?}", cli.log_file))?,
    )?;
    info!("Starting pdf-gallery");

    match &cli.config {
        Some(path) => settings::load_settings_from(path),
        None => settings::load_settings(),
    }

    let explicit = match (cli.pro, cli.free) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let capabilities = Capabilities::resolve_for_process(explicit);

    let result = run(cli.command, capabilities);
    if let Err(e) = &result {
        error!("Command failed: {e:?}");
    }
    info!("Shutting down pdf-gallery");
    result
}

fn run(command: Commands, capabilities: Capabilities) -> Result<()> {
    match command {
        Commands::Render {
            url,
            scale,
            out,
            embed,
        } => render(&url, scale, &out, embed),
        Commands::Zoom {
            url,
            page,
            x,
            y,
            out,
        } => zoom(&url, page, Point::new(x, y), &out),
        Commands::Rating { document_id } => {
            let client = ratings_client(capabilities)?;
            let summary = client.fetch(&document_id)?;
            println!(
                "{document_id}: {:.2} average from {} ratings{}",
                summary.average,
                summary.count,
                summary
                    .user_rating
                    .map(|r| format!(", yours: {r}"))
                    .unwrap_or_default()
            );
            Ok(())
        }
        Commands::Rate { document_id, stars } => {
            let rating = Rating::new(stars)?;
            let client = ratings_client(capabilities)?;
            let summary = client.submit(&document_id, rating)?;
            println!(
                "Recorded {rating} for {document_id}; now {:.2} from {} ratings",
                summary.average, summary.count
            );
            Ok(())
        }
        Commands::Gallery(cmd) => gallery(cmd, capabilities),
    }
}

fn engine() -> Result<Arc<dyn RenderEngine>> {
    #[cfg(feature = "pdf")]
    {
        Ok(Arc::new(pdf_gallery::pdf::MupdfEngine))
    }
    #[cfg(not(feature = "pdf"))]
    {
        bail!("built without the `pdf` feature, no render engine available")
    }
}

fn open_session(url: &str, scale: Option<f32>) -> Result<RenderSession> {
    let mut session = RenderSession::with_config(engine()?, settings::session_config());
    match scale {
        Some(scale) => session.load_with_scale(url, scale),
        None => session.load(url),
    }
    Ok(session)
}

fn load_failure(events: &[SessionEvent]) -> Option<&str> {
    events.iter().find_map(|event| match event {
        SessionEvent::LoadFailed { error } => Some(error.as_str()),
        _ => None,
    })
}

fn render(url: &str, scale: Option<f32>, out: &Path, embed: bool) -> Result<()> {
    let mut session = open_session(url, scale)?;
    let mut reporter = HeightReporter::new();
    if embed {
        if let Some(msg) = reporter.report_session(EmbedTrigger::Load, &session) {
            println!("{}", msg.to_json());
        }
    }

    let events = session.wait_until_loaded(LOAD_TIMEOUT);
    if let Some(error) = load_failure(&events) {
        bail!("failed to load {url}: {error}");
    }
    if session.is_loading() {
        bail!("timed out rendering {url}");
    }

    std::fs::create_dir_all(out).with_context(|| format!("creating {out:?}"))?;
    for page in 1..=session.page_count() {
        match (session.page_slot(page), session.surface(page)) {
            (PageSlot::Ready, Some(surface)) => {
                let path = out.join(format!("page-{page}.png"));
                let image = surface
                    .to_rgb_image()
                    .with_context(|| format!("page {page} has an invalid pixel buffer"))?;
                image
                    .save(&path)
                    .with_context(|| format!("writing {path:?}"))?;
                println!(
                    "page {page}: {}x{} -> {}",
                    surface.width_px,
                    surface.height_px,
                    path.display()
                );
            }
            (PageSlot::Failed, _) => println!("page {page}: failed to render"),
            _ => println!("page {page}: not rendered"),
        }
    }

    if embed {
        if let Some(msg) = reporter.report_session(EmbedTrigger::Layout, &session) {
            println!("{}", msg.to_json());
        }
    }
    Ok(())
}

fn zoom(url: &str, page: usize, click: Point, out: &Path) -> Result<()> {
    let mut session = open_session(url, None)?;
    let events = session.wait_until_loaded(LOAD_TIMEOUT);
    if let Some(error) = load_failure(&events) {
        bail!("failed to load {url}: {error}");
    }

    let Some(surface) = session.surface(page).cloned() else {
        bail!("page {page} is not rendered");
    };
    let page_box = PageBox::from_surface(&surface);
    let pointer = Point::new(
        page_box.left + click.x * page_box.width,
        page_box.top + click.y * page_box.height,
    );

    if !session.pointer_down(page, page_box, pointer, PointerKind::Mouse) {
        bail!("zoom did not start on page {page}");
    }
    session.wait_for_overlay(LOAD_TIMEOUT);

    let Some(placement) = session.overlay_placement(page_box) else {
        bail!("zoom overlay for page {page} did not render");
    };
    let overlay = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .context("overlay raster missing")?;
    overlay
        .to_rgb_image()
        .context("overlay has an invalid pixel buffer")?
        .save(out)
        .with_context(|| format!("writing {out:?}"))?;

    println!(
        "overlay {}x{} at ({:.1}, {:.1}) -> {}",
        placement.width,
        placement.height,
        placement.left,
        placement.top,
        out.display()
    );
    session.pointer_up();
    Ok(())
}

fn ratings_client(capabilities: Capabilities) -> Result<RatingsClient> {
    RatingsClient::from_settings(capabilities).context("cannot reach ratings")
}

fn gallery(cmd: GalleryCommand, capabilities: Capabilities) -> Result<()> {
    let path = settings::get_gallery_file()
        .or_else(JsonFileBackend::default_path)
        .context("no location for the gallery file")?;
    let gallery = Gallery::new(JsonFileBackend::new(path), capabilities);

    match cmd {
        GalleryCommand::List => {
            let settings = gallery.settings()?;
            for item in gallery.items()? {
                if settings.show_titles {
                    println!("{}  {}  {}", item.id, item.title, item.url);
                } else {
                    println!("{}  {}", item.id, item.url);
                }
            }
        }
        GalleryCommand::Add {
            title,
            url,
            thumbnail,
            description,
        } => {
            let item = GalleryItem {
                thumbnail,
                description,
                ..GalleryItem::new(title, url)
            };
            let id = item.id.clone();
            gallery.add_item(item)?;
            println!("Added {id}");
        }
        GalleryCommand::Remove { id } => {
            let item = gallery.remove_item(&id)?;
            println!("Removed {} ({})", item.id, item.title);
        }
        GalleryCommand::Move { id, index } => {
            gallery.move_item(&id, index)?;
        }
    }
    Ok(())
}
