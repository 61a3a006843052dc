//! Canned replies a handler composes when it short-circuits a query.
//!
//! Each reply sets Response, preserves the sender's ID and RecursionDesired
//! flag, and echoes the question section.

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{Record, RecordType};

fn canned(query: &Message, rcode: ResponseCode) -> Message {
    let mut rmsg = Message::new();
    rmsg.set_id(query.id());
    rmsg.set_message_type(MessageType::Response);
    rmsg.set_op_code(query.op_code());
    rmsg.set_recursion_desired(query.recursion_desired());
    rmsg.set_response_code(rcode);
    for q in query.queries() {
        rmsg.add_query(q.clone());
    }
    rmsg
}

/// The sender's message could not be interpreted.
pub fn format_error(query: &Message) -> Message {
    canned(query, ResponseCode::FormErr)
}

/// Something went wrong on our side while answering.
pub fn server_failure(query: &Message) -> Message {
    canned(query, ResponseCode::ServFail)
}

/// The requested operation is not supported.
pub fn not_implemented(query: &Message) -> Message {
    canned(query, ResponseCode::NotImp)
}

/// We decline to answer.
pub fn refused(query: &Message) -> Message {
    canned(query, ResponseCode::Refused)
}

/// NameError (NXDOMAIN) reply carrying `soa` in the authority section.
///
/// Panics if `soa` is not an SOA record.
pub fn name_error(query: &Message, soa: Record, authoritative: bool) -> Message {
    assert_eq!(
        soa.record_type(),
        RecordType::SOA,
        "name_error requires an SOA record"
    );
    let mut rmsg = canned(query, ResponseCode::NXDomain);
    rmsg.set_authoritative(authoritative);
    rmsg.add_name_server(soa);
    rmsg
}

/// Minimal Refused reply for a datagram that failed to decode, keeping
/// whatever of the header was readable (the ID octets).
pub(crate) fn refuse_fragment(datagram: &[u8]) -> Message {
    let id = if datagram.len() >= 2 {
        u16::from_be_bytes([datagram[0], datagram[1]])
    } else {
        0
    };
    let mut rmsg = Message::new();
    rmsg.set_id(id);
    rmsg.set_message_type(MessageType::Response);
    rmsg.set_op_code(OpCode::Query);
    rmsg.set_response_code(ResponseCode::Refused);
    rmsg
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use hickory_proto::rr::rdata::SOA;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{DNSClass, Name, RData};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn sample_query() -> Message {
        let mut q = Query::new();
        q.set_name(Name::from_str("www.example.com.").unwrap());
        q.set_query_type(RecordType::A);
        q.set_query_class(DNSClass::IN);
        let mut msg = Message::new();
        msg.set_id(69);
        msg.set_message_type(MessageType::Query);
        msg.set_op_code(OpCode::Query);
        msg.set_recursion_desired(true);
        msg.add_query(q);
        msg
    }

    #[test]
    fn canned_replies_echo_id_and_questions() {
        let query = sample_query();
        for (rmsg, rcode) in [
            (format_error(&query), ResponseCode::FormErr),
            (server_failure(&query), ResponseCode::ServFail),
            (not_implemented(&query), ResponseCode::NotImp),
            (refused(&query), ResponseCode::Refused),
        ] {
            assert_eq!(rmsg.id(), query.id());
            assert_eq!(rmsg.message_type(), MessageType::Response);
            assert_eq!(rmsg.response_code(), rcode);
            assert!(rmsg.recursion_desired());
            assert_eq!(rmsg.queries(), query.queries());
            assert!(rmsg.answers().is_empty());
        }
    }

    #[test]
    fn name_error_attaches_soa_authority() {
        let query = sample_query();
        let soa = Record::from_rdata(
            Name::from_str("example.com.").unwrap(),
            3600,
            RData::SOA(SOA::new(
                Name::from_str("ns1.example.com.").unwrap(),
                Name::from_str("hostmaster.example.com.").unwrap(),
                2024010101,
                7200,
                3600,
                1209600,
                3600,
            )),
        );

        let rmsg = name_error(&query, soa, true);

        assert_eq!(rmsg.response_code(), ResponseCode::NXDomain);
        assert!(rmsg.authoritative());
        assert_eq!(rmsg.name_servers().len(), 1);
        assert_eq!(rmsg.name_servers()[0].record_type(), RecordType::SOA);
    }

    #[test]
    #[should_panic(expected = "requires an SOA record")]
    fn name_error_rejects_non_soa() {
        let query = sample_query();
        let not_soa = Record::from_rdata(
            Name::from_str("example.com.").unwrap(),
            3600,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
        );
        let _ = name_error(&query, not_soa, false);
    }

    #[test]
    fn refuse_fragment_keeps_readable_id() {
        let rmsg = refuse_fragment(&[0xab, 0xcd, 0xff]);
        assert_eq!(rmsg.id(), 0xabcd);
        assert_eq!(rmsg.response_code(), ResponseCode::Refused);

        let rmsg = refuse_fragment(&[0xab]);
        assert_eq!(rmsg.id(), 0);
    }
}
