use crate::server::AppContext;
use crate::state::RenderEvent;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn sse_routes() -> Router<AppContext> {
    Router::new().route("/renders/events", get(render_events))
}

/// Registry changes as Server-Sent Events.
///
/// Every message is an unnamed event carrying one JSON [`RenderEvent`];
/// clients switch on its `event_type`. A subscriber that falls behind the
/// broadcast buffer silently misses the overwritten events.
pub async fn render_events(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let changes = BroadcastStream::new(ctx.registry.subscribe())
        .filter_map(|received| received.ok())
        .map(|event: RenderEvent| Ok(to_sse(&event)));

    let heartbeat = IntervalStream::new(tokio::time::interval(HEARTBEAT_INTERVAL)).map(|_| {
        Ok(Event::default()
            .event("heartbeat")
            .data(r#"{"event_type":"heartbeat"}"#))
    });

    Sse::new(changes.merge(heartbeat))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

fn to_sse(event: &RenderEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            tracing::warn!("Dropping unserializable render event: {e}");
            Event::default().comment("unserializable event")
        }
    }
}
