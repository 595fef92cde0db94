//! Integration tests for the in-process channel transport.

use kartlobby_transport::{
    ChannelTransport, HostId, Packet, Transport, TransportError, TransportEvent,
};

#[test]
fn test_link_announces_both_sides() {
    let (server, mut server_rx) = ChannelTransport::new(HostId::SERVER);
    let (client, mut client_rx) = ChannelTransport::new(HostId(5));

    ChannelTransport::link(&server, &client);

    assert_eq!(
        server_rx.try_recv().unwrap(),
        TransportEvent::Connected(HostId(5))
    );
    assert_eq!(
        client_rx.try_recv().unwrap(),
        TransportEvent::Connected(HostId::SERVER)
    );
    assert_eq!(server.peer_ids(), vec![HostId(5)]);
}

#[test]
fn test_send_to_tags_packet_with_sender() {
    let (server, _server_rx) = ChannelTransport::new(HostId::SERVER);
    let (client, mut client_rx) = ChannelTransport::new(HostId(9));
    ChannelTransport::link(&server, &client);
    let _ = client_rx.try_recv();

    server.send_to(HostId(9), &[16, 1, 2]).unwrap();

    assert_eq!(
        client_rx.try_recv().unwrap(),
        TransportEvent::Data(Packet {
            from: HostId::SERVER,
            data: vec![16, 1, 2],
        })
    );
}

#[test]
fn test_send_to_unknown_host_fails() {
    let (server, _rx) = ChannelTransport::new(HostId::SERVER);
    let err = server.send_to(HostId(3), &[1]).unwrap_err();
    assert!(matches!(err, TransportError::UnknownHost(HostId(3))));
}

#[test]
fn test_send_to_dropped_peer_reports_closed() {
    let (server, _rx) = ChannelTransport::new(HostId::SERVER);
    let (client, client_rx) = ChannelTransport::new(HostId(2));
    ChannelTransport::link(&server, &client);
    drop(client_rx);

    let err = server.send_to(HostId(2), &[1]).unwrap_err();
    assert!(matches!(err, TransportError::Closed(HostId(2))));
}

#[test]
fn test_broadcast_reaches_every_peer_and_skips_closed_ones() {
    let (server, _rx) = ChannelTransport::new(HostId::SERVER);
    let (a, mut a_rx) = ChannelTransport::new(HostId(1));
    let (b, b_rx) = ChannelTransport::new(HostId(2));
    ChannelTransport::link(&server, &a);
    ChannelTransport::link(&server, &b);
    let _ = a_rx.try_recv();
    drop(b_rx);

    server.broadcast(&[11]).unwrap();

    match a_rx.try_recv().unwrap() {
        TransportEvent::Data(packet) => assert_eq!(packet.data, vec![11]),
        other => panic!("expected data, got {other:?}"),
    }
}

#[test]
fn test_disconnect_notifies_both_inboxes() {
    let (server, mut server_rx) = ChannelTransport::new(HostId::SERVER);
    let (client, mut client_rx) = ChannelTransport::new(HostId(4));
    ChannelTransport::link(&server, &client);
    let _ = server_rx.try_recv();
    let _ = client_rx.try_recv();

    server.disconnect(HostId(4)).unwrap();

    assert_eq!(
        server_rx.try_recv().unwrap(),
        TransportEvent::Disconnected(HostId(4))
    );
    assert_eq!(
        client_rx.try_recv().unwrap(),
        TransportEvent::Disconnected(HostId::SERVER)
    );
    assert!(server.peer_ids().is_empty());
    assert!(matches!(
        server.disconnect(HostId(4)),
        Err(TransportError::UnknownHost(_))
    ));
}
