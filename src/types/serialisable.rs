/// Types implementing LineProtocol can be written to InfluxDB's `/write`
/// endpoint in the client -> server direction.
pub trait LineProtocol {
    /// Converts the value in question to line-protocol text, without a
    /// trailing newline.
    fn serialise_line_protocol(&self) -> String;
}
