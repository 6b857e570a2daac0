//! WebSocket upgrade + duel loop. Each connection owns at most one `Session`;
//! the loop multiplexes client messages with the session's clock/fetch notices,
//! so the battle is only ever touched from this task.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::domain::MatchConfig;
use crate::protocol::{BattleSnapshot, ClientWsMessage, ServerWsMessage};
use crate::session::{Notice, Session};
use crate::source::ChallengeSource;
use crate::state::AppState;

enum Incoming {
  Socket(Option<Result<Message, axum::Error>>),
  Notice(Notice),
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "arena_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn session_notice(session: &mut Option<Session>) -> Option<Notice> {
  match session {
    Some(s) => s.next_notice().await,
    None => std::future::pending().await,
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "arena_backend", error = %e, "WS send error");
      false
    }
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "arena_backend", "WebSocket connected");
  let mut session: Option<Session> = None;

  loop {
    let incoming = tokio::select! {
      msg = socket.recv() => Incoming::Socket(msg),
      Some(notice) = session_notice(&mut session) => Incoming::Notice(notice),
    };

    let replies = match incoming {
      Incoming::Socket(Some(Ok(Message::Text(txt)))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(msg) => {
          debug!(target: "arena_backend", "WS received: {:?}", &msg);
          handle_client_ws(msg, &mut session, &state)
        }
        Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
      },
      Incoming::Socket(Some(Ok(Message::Ping(payload)))) => {
        let _ = socket.send(Message::Pong(payload)).await;
        continue;
      }
      Incoming::Socket(Some(Ok(Message::Close(_)))) | Incoming::Socket(None) => break,
      Incoming::Socket(Some(Err(e))) => {
        error!(target: "arena_backend", error = %e, "WS receive error");
        break;
      }
      Incoming::Socket(Some(Ok(_))) => continue,
      Incoming::Notice(Notice::Progress { round, value }) => vec![ServerWsMessage::Progress { round, value }],
      Incoming::Notice(Notice::Changed) => match &session {
        Some(s) => vec![snapshot(s)],
        None => continue,
      },
    };

    let mut ok = true;
    for reply in &replies {
      ok = send(&mut socket, reply).await;
      if !ok {
        break;
      }
    }
    if !ok {
      break;
    }
  }

  if let Some(mut s) = session.take() {
    s.close();
  }
  info!(target: "arena_backend", "WebSocket disconnected");
}

fn snapshot(s: &Session) -> ServerWsMessage {
  ServerWsMessage::State { snapshot: BattleSnapshot::of(s.battle()) }
}

fn handle_client_ws(msg: ClientWsMessage, session: &mut Option<Session>, state: &Arc<AppState>) -> Vec<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

    ClientWsMessage::StartMatch { difficulty, topic } => match MatchConfig::new(difficulty, &topic) {
      Ok(cfg) => {
        if let Some(mut old) = session.take() {
          old.close();
        }
        let source: Arc<dyn ChallengeSource> = state.clone();
        let mut s = Session::new(cfg, &state.settings, source);
        s.start();
        info!(target: "battle", %difficulty, %topic, "WS match started");
        let reply = snapshot(&s);
        *session = Some(s);
        vec![reply]
      }
      Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
    },

    ClientWsMessage::SubmitAnswer { answer } => match session {
      Some(s) => if s.submit(&answer) { vec![snapshot(s)] } else { Vec::new() },
      None => vec![ServerWsMessage::Error { message: "No match in progress.".into() }],
    },

    ClientWsMessage::NextRound => match session {
      Some(s) => if s.advance() { vec![snapshot(s)] } else { Vec::new() },
      None => vec![ServerWsMessage::Error { message: "No match in progress.".into() }],
    },

    ClientWsMessage::Leave => {
      if let Some(mut s) = session.take() {
        s.close();
        info!(target: "battle", round = s.battle().round(), "WS match left");
      }
      Vec::new()
    }
  }
}
