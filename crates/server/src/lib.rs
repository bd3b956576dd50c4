use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use artidash_engine::SystemClock;
use serde::Serialize;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

pub mod config;
pub mod dashboard;
pub mod logging;
pub mod subscription;

pub use config::{Config, RetryConfig};
pub use dashboard::{ConnectionStatus, Dashboard, DashboardOptions, DashboardView};
pub use subscription::{Subscription, TransportEvent};

#[derive(Clone)]
pub struct AppState {
    pub views: watch::Receiver<Arc<DashboardView>>,
}

impl AppState {
    fn view(&self) -> Arc<DashboardView> {
        Arc::clone(&self.views.borrow())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/health", get(health))
        .route("/api/snapshot", get(snapshot))
        .route("/api/progress", get(progress))
        .route("/api/view", get(view))
        .route("/api/characters/{name}", get(character))
        .with_state(Arc::new(state))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-store"),
        ))
        // Local security: allow only loopback + Tailscale by default.
        .layer(middleware::from_fn(ip_allowlist))
        // Never use `Access-Control-Allow-Origin: *` here; the view exposes
        // the whole account state to any page that can reach it.
        .layer(local_only_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn snapshot(State(state): State<Arc<AppState>>) -> Response {
    Json(Arc::clone(&state.view().snapshot)).into_response()
}

async fn progress(State(state): State<Arc<AppState>>) -> Response {
    Json(state.view().progress.clone()).into_response()
}

async fn view(State(state): State<Arc<AppState>>) -> Json<Arc<DashboardView>> {
    Json(state.view())
}

#[derive(Debug, Serialize)]
struct EquippedSlot<'a> {
    slot: &'static str,
    item: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CharacterView<'a> {
    character: &'a artidash_protocol::Character,
    progress: Option<&'a artidash_engine::CharacterProgress>,
    /// Every slot in display order, empty ones included.
    equipment: Vec<EquippedSlot<'a>>,
    stale: bool,
}

async fn character(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let view = state.view();
    let Some(character) = view.snapshot.character(&name) else {
        return (StatusCode::NOT_FOUND, "unknown character").into_response();
    };
    Json(CharacterView {
        character,
        progress: view.progress.get(&name),
        equipment: character
            .equipment_in_order()
            .map(|(slot, item)| EquippedSlot { slot, item })
            .collect(),
        stale: view.stale.iter().any(|n| n == &name),
    })
    .into_response()
}

/// Connects to the producer and serves the read API until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let url = config.stream_url()?;
    let options = DashboardOptions {
        sample_interval: config.sample_interval(),
        clamp: config.clamp.into(),
        stale: config.stale_policy(),
    };
    tracing::info!(
        sample_ms = options.sample_interval.as_millis() as u64,
        clamp = ?options.clamp,
        stale = ?options.stale,
        "starting dashboard"
    );

    let dashboard = Dashboard::new(options, Arc::new(SystemClock));
    let (views_tx, views_rx) = watch::channel(dashboard.view());
    let (subscription, events) = Subscription::open(url, config.retry());
    let mut dashboard_task = tokio::spawn(dashboard.run(events, views_tx));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "read api listening");
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = tokio::spawn(serve_listener(
        listener,
        AppState { views: views_rx },
        async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        },
    ));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutdown requested");
        }
        _ = &mut dashboard_task => {
            tracing::warn!("event stream ended");
        }
    }

    drop(subscription);
    dashboard_task.abort();
    let _ = stop_tx.send(true);
    server.await??;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let ip = peer.ip();
    if is_allowed_peer_ip(ip) {
        return next.run(req).await;
    }
    tracing::debug!(%ip, "rejected peer");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }

    // Tailscale CGNAT range (100.64.0.0/10).
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (64..=127).contains(&o[1])
        }
        IpAddr::V6(_v6) => false,
    }
}

fn local_only_cors() -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &axum::http::HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

// Presentation lives elsewhere; this page only proves the read API is wired.
const DASHBOARD_HTML: &str = r###"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>artidash</title>
  <style>
    body{font-family:ui-monospace,monospace;background:#081325;color:#e6fbff;margin:16px}
    .dot{display:inline-block;width:8px;height:8px;border-radius:99px;background:#ffd06b}
    .dot.ok{background:#4df5bf}
  </style>
</head>
<body>
  <div><span id="connDot" class="dot"></span> <span id="connText">connecting</span></div>
  <pre id="view">waiting</pre>
  <script>
  (function(){
    const $ = (id) => document.getElementById(id);
    async function viewLoop(){
      for(;;){
        try{
          const r = await fetch("/api/view", { cache: "no-store" });
          if (!r.ok) throw new Error("bad");
          const v = await r.json();
          $("connDot").classList.toggle("ok", v.connection.state === "open");
          $("connText").textContent = v.connection.state;
          $("view").textContent = JSON.stringify(v, null, 2);
        }catch(_e){
          $("connDot").classList.remove("ok");
          $("connText").textContent = "offline";
        }
        await new Promise(res => setTimeout(res, 400));
      }
    }
    viewLoop();
  })();
  </script>
</body>
</html>
"###;
