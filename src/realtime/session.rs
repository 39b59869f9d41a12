use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Running, StreamHandler};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::realtime::hub::{Connect, Disconnect, Subscribe, TopicHub, Unsubscribe, WsMessage};
use crate::realtime::model::{ClientMessage, ServerMessage, Topic};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One WebSocket connection. Anonymous sessions may subscribe too.
pub struct WsSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub hub: Addr<TopicHub>,
    pub last_heartbeat: Instant,
}

impl WsSession {
    pub fn new(user_id: Option<String>, hub: Addr<TopicHub>) -> Self {
        WsSession {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            hub,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!("WebSocket client heartbeat timeout, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Canonical topic name, or an error sent back to the client.
    fn parse_topic(&self, raw: &str, ctx: &mut ws::WebsocketContext<Self>) -> Option<String> {
        match raw.parse::<Topic>() {
            Ok(topic) => Some(topic.to_string()),
            Err(e) => {
                self.send_message(&ServerMessage::Error { message: e.to_string() }, ctx);
                None
            }
        }
    }

    fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg {
            ClientMessage::Subscribe { topic } => {
                if let Some(topic) = self.parse_topic(&topic, ctx) {
                    self.hub.do_send(Subscribe {
                        session_id: self.session_id.clone(),
                        topic,
                    });
                }
            }
            ClientMessage::Unsubscribe { topic } => {
                if let Some(topic) = self.parse_topic(&topic, ctx) {
                    self.hub.do_send(Unsubscribe {
                        session_id: self.session_id.clone(),
                        topic,
                    });
                }
            }
            ClientMessage::Ping => {
                self.send_message(&ServerMessage::Pong, ctx);
            }
        }
    }

    fn send_message(&self, msg: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        if let Ok(json) = serde_json::to_string(msg) {
            ctx.text(json);
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        let addr = ctx.address();
        self.hub.do_send(Connect {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            addr: addr.recipient(),
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.hub.do_send(Disconnect {
            session_id: self.session_id.clone(),
        });
        Running::Stop
    }
}

/// Events relayed by the hub
impl Handler<WsMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => self.handle_message(client_msg, ctx),
                    Err(e) => {
                        log::warn!("Failed to parse WebSocket message: {}", e);
                        self.send_message(
                            &ServerMessage::Error {
                                message: format!("Invalid message format: {}", e),
                            },
                            ctx,
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                log::warn!("Binary messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                log::info!("WebSocket close: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}
