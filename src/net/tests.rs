//! Transport Tests
//!
//! Validates the framed datagram layer: kind byte prefixing, whole-datagram
//! reads, and the single-datagram size cap.

#[cfg(test)]
mod tests {
    use crate::net::UdpTransport;
    use crate::wire::MAX_DATAGRAM;

    #[tokio::test]
    async fn test_send_and_receive_frame() {
        let a = UdpTransport::bind("127.0.0.1:0", 0.0).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0", 0.0).await.unwrap();

        let body = vec![1u8, 2, 3, 4];
        a.send(42, &body, b.local_addr().unwrap()).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (kind, len, src) = b.recv(&mut buf).await.unwrap().expect("a frame");
        assert_eq!(kind, 42);
        assert_eq!(len, body.len() + 1);
        assert_eq!(&buf[1..len], &body[..]);
        assert_eq!(src, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_oversized_send_is_rejected() {
        let a = UdpTransport::bind("127.0.0.1:0", 0.0).await.unwrap();
        let dest = a.local_addr().unwrap();
        let body = vec![0u8; MAX_DATAGRAM];
        assert!(a.send(100, &body, dest).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let a = UdpTransport::bind("127.0.0.1:0", 0.0).await.unwrap();
        let addr = a.resolve("127.0.0.1", 9999).await.unwrap();
        assert_eq!(addr.port(), 9999);
    }
}
