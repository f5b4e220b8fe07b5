#![forbid(unsafe_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use taskchat_domain::MessageId;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::ClientCoreError;
use crate::config::{ClientConfig, SessionConfig};
use crate::input::KeyPress;
use crate::session::{CLOSE_CODE_ABNORMAL, CLOSE_CODE_NO_STATUS, ChatSession, SessionOutcome};
use crate::view::ChatView;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Produces fresh session configuration when the session is reset.
pub type ConfigRefresh = Box<dyn FnMut() -> Result<SessionConfig, ClientCoreError> + Send>;

/// UI events forwarded to the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
	DraftChanged(String),
	KeyPressed { text: String, key: KeyPress },
	Submit(String),
	LoadMore,
	DeleteMessage(MessageId),
	JoinModeration,
	LeaveModeration,
	DismissWarnings,
	DismissNotification,
	/// Drop the connection and start over with fresh configuration.
	Reset,
	Shutdown,
}

/// Cloneable sender half for a running [`ChatClient`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
	command_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
	pub fn send(&self, cmd: SessionCommand) -> Result<(), ClientCoreError> {
		self.command_tx.send(cmd).map_err(|_| ClientCoreError::NotRunning)
	}

	pub fn draft_changed(&self, text: impl Into<String>) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::DraftChanged(text.into()))
	}

	pub fn key_pressed(&self, text: impl Into<String>, key: KeyPress) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::KeyPressed { text: text.into(), key })
	}

	pub fn submit(&self, text: impl Into<String>) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::Submit(text.into()))
	}

	pub fn load_more(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::LoadMore)
	}

	pub fn delete_message(&self, id: MessageId) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::DeleteMessage(id))
	}

	pub fn join_moderation(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::JoinModeration)
	}

	pub fn leave_moderation(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::LeaveModeration)
	}

	pub fn dismiss_warnings(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::DismissWarnings)
	}

	pub fn dismiss_notification(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::DismissNotification)
	}

	pub fn reset(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::Reset)
	}

	pub fn shutdown(&self) -> Result<(), ClientCoreError> {
		self.send(SessionCommand::Shutdown)
	}
}

enum Next {
	Reset,
	Shutdown,
}

/// Drives a [`ChatSession`] over a WebSocket connection.
///
/// There is no automatic reconnect: once the connection closes the task keeps serving local
/// commands until it is reset or shut down.
pub struct ChatClient<V> {
	client: ClientConfig,
	session: ChatSession<V>,
	command_rx: mpsc::UnboundedReceiver<SessionCommand>,
	refresh: Option<ConfigRefresh>,
}

impl<V: ChatView> ChatClient<V> {
	pub fn new(client: ClientConfig, session: SessionConfig, view: V) -> (Self, SessionHandle) {
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let session = ChatSession::new(session, view).with_max_frame_bytes(client.max_frame_bytes);

		(
			Self {
				client,
				session,
				command_rx,
				refresh: None,
			},
			SessionHandle { command_tx },
		)
	}

	/// Source of fresh configuration on reset. Without one the current configuration is reused.
	pub fn with_config_refresh<F>(mut self, refresh: F) -> Self
	where
		F: FnMut() -> Result<SessionConfig, ClientCoreError> + Send + 'static,
	{
		self.refresh = Some(Box::new(refresh));
		self
	}

	pub fn session(&self) -> &ChatSession<V> {
		&self.session
	}

	/// Run until shut down (or every handle is dropped). Returns the view.
	pub async fn run(mut self) -> Result<V, ClientCoreError> {
		loop {
			let url = self.client.room_url(self.session.config());

			let next = match connect(&url, self.client.connect_timeout).await {
				Ok(ws) => match self.drive(ws).await {
					Some(next) => next,
					None => self.idle().await,
				},
				Err(e) => {
					self.session.on_error(&e.to_string());
					self.session.on_close(CLOSE_CODE_ABNORMAL);
					self.idle().await
				}
			};

			match next {
				Next::Reset => {
					let fresh = match self.refresh.as_mut() {
						Some(refresh) => refresh()?,
						None => self.session.config().clone(),
					};
					self.session.reset(fresh);
				}
				Next::Shutdown => {
					info!(room = %self.session.config().room_id, "chat client stopped");
					return Ok(self.session.into_view());
				}
			}
		}
	}

	/// Returns `None` once the connection is gone and the session has closed.
	async fn drive(&mut self, mut ws: WsStream) -> Option<Next> {
		self.session.on_open();

		loop {
			if let Err(e) = self.flush(&mut ws).await {
				self.session.on_error(&e.to_string());
				self.session.on_close(CLOSE_CODE_ABNORMAL);
				return None;
			}

			tokio::select! {
				cmd = self.command_rx.recv() => {
					let next = match cmd {
						Some(cmd) => self.handle_command(cmd),
						None => {
							debug!("all session handles dropped");
							Some(Next::Shutdown)
						}
					};
					if next.is_some() {
						close_quietly(&mut ws).await;
						return next;
					}
				}
				msg = ws.next() => {
					match msg {
						Some(Ok(Message::Text(text))) => self.session.on_frame(text.as_str()),
						Some(Ok(Message::Ping(payload))) => {
							if let Err(e) = ws.send(Message::Pong(payload)).await {
								debug!(error = %e, "failed to answer ping");
							}
						}
						Some(Ok(Message::Close(frame))) => {
							let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_CODE_NO_STATUS);
							self.session.on_close(code);
							close_quietly(&mut ws).await;
							return None;
						}
						Some(Ok(Message::Binary(data))) => {
							warn!(len = data.len(), "ignoring binary frame");
						}
						Some(Ok(_)) => {}
						Some(Err(e)) => {
							self.session.on_error(&e.to_string());
							self.session.on_close(CLOSE_CODE_ABNORMAL);
							return None;
						}
						None => {
							self.session.on_close(CLOSE_CODE_ABNORMAL);
							return None;
						}
					}
				}
			}
		}
	}

	/// Connection is gone; only local commands have an effect.
	async fn idle(&mut self) -> Next {
		while let Some(cmd) = self.command_rx.recv().await {
			if let Some(next) = self.handle_command(cmd) {
				return next;
			}
		}
		Next::Shutdown
	}

	fn handle_command(&mut self, cmd: SessionCommand) -> Option<Next> {
		match cmd {
			SessionCommand::DraftChanged(text) => self.session.draft_changed(&text),
			SessionCommand::KeyPressed { text, key } => {
				self.session.key_released(&text, key);
			}
			SessionCommand::Submit(text) => {
				self.session.submit(&text);
			}
			SessionCommand::LoadMore => {
				self.session.load_more();
			}
			SessionCommand::DeleteMessage(id) => {
				self.session.delete_message(&id);
			}
			SessionCommand::JoinModeration => {
				self.session.join_moderation();
			}
			SessionCommand::LeaveModeration => {
				self.session.leave_moderation();
			}
			SessionCommand::DismissWarnings => self.session.dismiss_warnings(),
			SessionCommand::DismissNotification => {
				if self.session.dismiss_notification() == SessionOutcome::ResetRequested {
					return Some(Next::Reset);
				}
			}
			SessionCommand::Reset => return Some(Next::Reset),
			SessionCommand::Shutdown => return Some(Next::Shutdown),
		}
		None
	}

	async fn flush(&mut self, ws: &mut WsStream) -> Result<(), tungstenite::Error> {
		for frame in self.session.drain_outbound() {
			ws.send(Message::Text(frame.into())).await?;
		}
		Ok(())
	}
}

async fn connect(url: &str, timeout: Duration) -> Result<WsStream, ClientCoreError> {
	info!(%url, "connecting to chat room");

	match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
		Ok(Ok((ws, _response))) => Ok(ws),
		Ok(Err(e)) => Err(ClientCoreError::Connect(e.to_string())),
		Err(_) => Err(ClientCoreError::Connect(format!("timed out after {timeout:?}"))),
	}
}

async fn close_quietly(ws: &mut WsStream) {
	if let Err(e) = ws.close(None).await {
		debug!(error = %e, "websocket close");
	}
}
