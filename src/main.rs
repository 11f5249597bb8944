use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use report_viewers::config::AppConfig;
use report_viewers::directory::{
    Contact, ContactDirectory, ContactDraft, ContactStore, CsvContactStore,
};
use report_viewers::error::AppError;
use report_viewers::export::{encode_edges, export_filename, resolve_directory};
use report_viewers::hierarchy::HierarchyStore;
use report_viewers::telemetry;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
    hierarchy: Arc<HierarchyStore>,
    // One lock around the whole mutate-then-persist sequence keeps the
    // primary-contact and dense-id invariants under concurrent requests.
    directory: Arc<Mutex<ContactDirectory<CsvContactStore>>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Report Viewers Directory",
    about = "Maintain report-viewer contacts against the course-evaluation hierarchy",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write the viewer-association export CSV and exit
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Directory to write the dated export file into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Export(args) => run_export(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let hierarchy = HierarchyStore::from_path(&config.data.hierarchy_csv)?;
    let directory = ContactDirectory::load(CsvContactStore::new(&config.data.contacts_csv))?;
    info!(
        nodes = hierarchy.len(),
        contacts = directory.len(),
        "hierarchy and contact snapshots loaded"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        hierarchy: Arc::new(hierarchy),
        directory: Arc::new(Mutex::new(directory)),
    };

    let app = app_router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "report viewers directory ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let hierarchy = HierarchyStore::from_path(&config.data.hierarchy_csv)?;
    let store = CsvContactStore::new(&config.data.contacts_csv);
    let contacts = store.load()?;

    let edges = resolve_directory(&hierarchy, &contacts);
    let document = encode_edges(&edges);
    let path = args
        .out_dir
        .join(export_filename(Local::now().date_naive()));
    std::fs::write(&path, document)?;

    println!(
        "Exported {} association(s) for {} contact(s) to {}",
        edges.len(),
        contacts.len(),
        path.display()
    );
    Ok(())
}

fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/v1/contacts/:id",
            put(update_contact).delete(delete_contact),
        )
        .route("/api/v1/colleges", get(college_index))
        .route("/api/v1/export", get(export_endpoint))
        .with_state(state)
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn list_contacts(State(state): State<AppState>) -> Json<Vec<Contact>> {
    let directory = state.directory.lock().expect("directory mutex poisoned");
    Json(directory.contacts().to_vec())
}

async fn create_contact(
    State(state): State<AppState>,
    Json(draft): Json<ContactDraft>,
) -> Result<impl IntoResponse, AppError> {
    let mut directory = state.directory.lock().expect("directory mutex poisoned");
    let contact = directory.insert(&state.hierarchy, draft)?.clone();
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(draft): Json<ContactDraft>,
) -> Result<Json<Contact>, AppError> {
    let mut directory = state.directory.lock().expect("directory mutex poisoned");
    let contact = directory.update(id, draft)?.clone();
    Ok(Json(contact))
}

async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, AppError> {
    let mut directory = state.directory.lock().expect("directory mutex poisoned");
    directory.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct CollegeView {
    college: String,
    departments: Vec<String>,
}

/// Selection data for contact forms: colleges with their departments, from
/// the index derived at hierarchy load.
async fn college_index(State(state): State<AppState>) -> Json<Vec<CollegeView>> {
    let views = state
        .hierarchy
        .colleges()
        .into_iter()
        .map(|college| CollegeView {
            college: college.caption.clone(),
            departments: state.hierarchy.departments_of(&college.caption).to_vec(),
        })
        .collect();
    Json(views)
}

async fn export_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let directory = state.directory.lock().expect("directory mutex poisoned");
    let edges = resolve_directory(&state.hierarchy, directory.contacts());
    let document = encode_edges(&edges);
    let filename = export_filename(Local::now().date_naive());

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        document,
    )
}
