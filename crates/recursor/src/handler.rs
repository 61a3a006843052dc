//! The server handler fronting the resolver: screens each incoming query,
//! then answers it from the delegation walk.

use crate::resolver::{Resolver, MAX_DEPTH};
use async_trait::async_trait;
use burrow_dns_core::reply;
use burrow_dns_core::{Handler, ResponseWriter, EXCHANGE_TIMEOUT};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{DNSClass, RecordType};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Handles one recursive query per invocation; no state is carried between
/// queries beyond the shared cache inside the resolver.
pub struct RecursorHandler {
    resolver: Arc<Resolver>,
}

impl RecursorHandler {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Screen `qmsg` against what we are willing to resolve. A rejected
    /// query yields the canned reply to send instead.
    fn screen(qmsg: &Message) -> Option<Message> {
        if !qmsg.recursion_desired() {
            return Some(reply::refused(qmsg));
        }
        if qmsg.op_code() != OpCode::Query {
            return Some(reply::refused(qmsg));
        }
        if qmsg.queries().len() != 1 {
            return Some(reply::format_error(qmsg));
        }
        let q = &qmsg.queries()[0];
        if q.query_type() == RecordType::ANY {
            return Some(reply::not_implemented(qmsg));
        }
        if q.query_class() != DNSClass::IN {
            return Some(reply::not_implemented(qmsg));
        }
        None
    }
}

#[async_trait]
impl Handler for RecursorHandler {
    async fn handle(&self, w: &mut dyn ResponseWriter, qmsg: &Message) {
        if let Some(rejection) = Self::screen(qmsg) {
            debug!(rcode = ?rejection.response_code(), "query rejected");
            if let Err(e) = w.write_msg(&rejection).await {
                debug!(error = %e, "failed to write rejection");
            }
            return;
        }

        let q = qmsg.queries()[0].clone();
        let mut rmsg = Message::new();
        rmsg.set_id(qmsg.id());
        rmsg.set_message_type(MessageType::Response);
        rmsg.set_op_code(OpCode::Query);
        rmsg.set_recursion_desired(qmsg.recursion_desired());
        rmsg.set_recursion_available(true);
        for query in qmsg.queries() {
            rmsg.add_query(query.clone());
        }

        // Bound the whole walk, not just each hop.
        let deadline = EXCHANGE_TIMEOUT * MAX_DEPTH as u32;
        let resolved = match timeout(deadline, self.resolver.resolve_from_root(&q)).await {
            Ok(Ok(resolved)) => Some(resolved),
            Ok(Err(e)) => {
                warn!(name = %q.name(), error = %e, "resolution failed");
                None
            }
            Err(_) => {
                warn!(name = %q.name(), "resolution deadline exceeded");
                None
            }
        };

        match resolved {
            Some(resolved) => {
                rmsg.set_response_code(resolved.response_code());
                rmsg.insert_answers(resolved.answers().to_vec());
                if rmsg.answers().is_empty() {
                    // Show the client the delegation chain we reached.
                    rmsg.insert_name_servers(resolved.name_servers().to_vec());
                }
            }
            None => {
                rmsg.set_response_code(ResponseCode::ServFail);
            }
        }

        if let Err(e) = w.write_msg(&rmsg).await {
            debug!(error = %e, "failed to write reply");
        }
    }
}
