//! Answer retrieval wire messages.
//!
//! ```protobuf
//! message QueryRequest { string text = 1; }
//! message TextResponse { string text = 1; }
//! ```

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryRequest {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TextResponse {
    #[prost(string, tag = "1")]
    pub text: String,
}
