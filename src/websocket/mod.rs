//! WebSocket Live Snapshots
//!
//! Pushes the full ordered point list of a journey to viewers whenever it
//! changes.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages connections and per-journey forwarding tasks
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Defines client and server message formats
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8082/api/v1/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', journeys: ['camino']}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'snapshot') render(msg.points);
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHub, ConnectionId, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage};
