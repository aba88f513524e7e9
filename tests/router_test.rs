use actor_flow::{ChannelRouter, FlowError, Inspect, RouterMode};
use flow_framework::mock::Probe;
use flow_framework::{Connector, Output};
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(50);

#[tokio::test]
async fn message_without_subscribers_is_dead_lettered_and_audited() {
    let (router, handle) = ChannelRouter::<&str, u32>::new();
    tokio::spawn(router.run());
    let mut all = Probe::attached(handle.sink_all());
    let mut dead = Probe::attached(handle.sink_dead());
    let other = Probe::new();
    handle.subscribe(&other.input(), "other").unwrap();

    handle.send("nobody", 7).unwrap();
    let stats = handle.stats().await.unwrap();

    assert_eq!(dead.drain(), vec![7]);
    assert_eq!(all.drain(), vec![7]);
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.delivered, 0);
}

#[tokio::test]
async fn message_reaches_exactly_the_subscribers_of_its_key() {
    let (router, handle) = ChannelRouter::<&str, u32>::new();
    tokio::spawn(router.run());
    let mut all = Probe::attached(handle.sink_all());
    let mut dead = Probe::attached(handle.sink_dead());
    let mut first = Probe::new();
    let mut second = Probe::new();
    let mut elsewhere = Probe::new();

    handle.subscribe(&first.input(), "prices").unwrap();
    handle.subscribe(&second.input(), "prices").unwrap();
    handle.subscribe(&elsewhere.input(), "orders").unwrap();

    handle.send("prices", 1).unwrap();
    handle.send("prices", 2).unwrap();
    let stats = handle.stats().await.unwrap();

    assert_eq!(first.drain(), vec![1, 2]);
    assert_eq!(second.drain(), vec![1, 2]);
    assert!(elsewhere.drain().is_empty());
    assert!(dead.drain().is_empty());
    assert_eq!(all.drain(), vec![1, 2]);
    assert_eq!(stats.delivered, 4);
    assert_eq!(stats.keys, 2);
    assert_eq!(stats.subscriptions, 3);
}

#[tokio::test]
async fn duplicate_subscribe_delivers_once_and_unsubscribe_falls_back_to_dead() {
    let (router, handle) = ChannelRouter::<u8, &str>::new();
    tokio::spawn(router.run());
    let mut dead = Probe::attached(handle.sink_dead());
    let mut subscriber = Probe::new();

    handle.subscribe(&subscriber.input(), 1).unwrap();
    handle.subscribe(&subscriber.input(), 1).unwrap();
    handle.send(1, "once").unwrap();

    handle.unsubscribe(&subscriber.input(), 1).unwrap();
    handle.unsubscribe(&subscriber.input(), 1).unwrap();
    handle.send(1, "orphan").unwrap();
    let stats = handle.stats().await.unwrap();

    assert_eq!(subscriber.drain(), vec!["once"]);
    assert_eq!(dead.drain(), vec!["orphan"]);
    assert_eq!(stats.subscriptions, 0);
}

#[tokio::test]
async fn keyed_input_sends_on_its_key() {
    let (router, handle) = ChannelRouter::<&str, u32>::new();
    tokio::spawn(router.run());
    let mut subscriber = Probe::new();
    handle.subscribe(&subscriber.input(), "k").unwrap();

    let input = handle.keyed_input("k");
    input.send(3).unwrap();
    handle.stats().await.unwrap();

    assert_eq!(subscriber.drain(), vec![3]);
}

#[tokio::test]
async fn publication_is_wired_when_publish_returns() {
    let (router, handle) = ChannelRouter::<&str, u32>::new();
    tokio::spawn(router.run());
    let mut subscriber = Probe::new();
    let mut all = Probe::attached(handle.sink_all());
    let mut dead = Probe::attached(handle.sink_dead());
    handle.subscribe(&subscriber.input(), "k").unwrap();

    let source = Output::new();
    handle.publish(&source, "k").await.unwrap();
    assert_eq!(source.emit(1), 1);
    handle.stats().await.unwrap();

    assert_eq!(subscriber.drain(), vec![1]);
    assert_eq!(all.drain(), vec![1]);
    assert!(dead.drain().is_empty());

    handle.unpublish(&source, "k").await.unwrap();
    assert_eq!(source.emit(2), 0);
    let stats = handle.stats().await.unwrap();

    assert!(subscriber.drain().is_empty());
    assert!(all.drain().is_empty());
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn mediated_publication_is_wired_when_publish_returns() {
    let (router, handle) = ChannelRouter::<&str, u32>::mediated();
    tokio::spawn(router.run());
    let mut subscriber = Probe::new();
    let mut all = Probe::attached(handle.sink_all());
    handle.subscribe(&subscriber.input(), "k").unwrap();

    let source = Output::new();
    handle.publish(&source, "k").await.unwrap();
    assert_eq!(source.emit(7), 1);

    assert_eq!(subscriber.recv().await, Some(7));
    assert_eq!(all.recv().await, Some(7));
}

async fn publish_then_unpublish_twice(mode: RouterMode) {
    let (router, handle) = ChannelRouter::<&str, u32>::with_mode(mode);
    tokio::spawn(router.run());
    let mut subscriber = Probe::new();
    let mut all = Probe::attached(handle.sink_all());
    handle.subscribe(&subscriber.input(), "ticks").unwrap();

    let source = Connector::identity("ticker");
    handle.publish(source.output(), "ticks").await.unwrap();
    handle.publish(source.output(), "ticks").await.unwrap();
    assert_eq!(handle.stats().await.unwrap().publications, 1);

    source.input().send(1).unwrap();
    source.input().send(2).unwrap();
    assert_eq!(subscriber.take(2).await, vec![1, 2]);
    assert_eq!(all.take(2).await, vec![1, 2]);

    handle.unpublish(source.output(), "ticks").await.unwrap();
    handle.unpublish(source.output(), "ticks").await.unwrap();
    assert_eq!(handle.stats().await.unwrap().publications, 0);

    source.input().send(3).unwrap();
    subscriber.expect_silence(QUIET).await;
    all.expect_silence(QUIET).await;
}

#[tokio::test]
async fn direct_publication_is_idempotent() {
    publish_then_unpublish_twice(RouterMode::Direct).await;
}

#[tokio::test]
async fn mediated_publication_is_idempotent() {
    publish_then_unpublish_twice(RouterMode::Mediated).await;
}

#[tokio::test]
async fn one_source_can_publish_on_several_keys() {
    let (router, handle) = ChannelRouter::<&str, u32>::mediated();
    tokio::spawn(router.run());
    let mut left = Probe::new();
    let mut right = Probe::new();
    handle.subscribe(&left.input(), "left").unwrap();
    handle.subscribe(&right.input(), "right").unwrap();

    let source = Connector::identity("fan");
    handle.publish(source.output(), "left").await.unwrap();
    handle.publish(source.output(), "right").await.unwrap();
    assert_eq!(handle.stats().await.unwrap().publications, 2);

    source.input().send(9).unwrap();
    assert_eq!(left.recv().await, Some(9));
    assert_eq!(right.recv().await, Some(9));
}

#[tokio::test]
async fn publications_from_many_producers_all_arrive() {
    let (router, handle) = ChannelRouter::<&str, (usize, u32)>::mediated();
    tokio::spawn(router.run());
    let mut subscriber = Probe::new();
    handle.subscribe(&subscriber.input(), "merged").unwrap();

    let sources: Vec<_> = (0..4).map(|_| Connector::identity("producer")).collect();
    for source in &sources {
        handle.publish(source.output(), "merged").await.unwrap();
    }

    let producers: Vec<_> = sources
        .iter()
        .enumerate()
        .map(|(id, source)| {
            let input = source.input().clone();
            tokio::spawn(async move {
                for n in 0..25 {
                    input.send((id, n)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let received = subscriber.take(100).await;
    // Order holds per producer, not across producers.
    for id in 0..4 {
        let sequence: Vec<u32> = received
            .iter()
            .filter(|(from, _)| *from == id)
            .map(|(_, n)| *n)
            .collect();
        assert_eq!(sequence, (0..25).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn calls_on_a_stopped_router_report_actor_closed() {
    let (router, handle) = ChannelRouter::<&str, u32>::new();
    drop(router);

    let source = Output::new();
    assert_eq!(
        handle.publish(&source, "k").await,
        Err(FlowError::ActorClosed)
    );
    assert_eq!(handle.send("k", 1), Err(FlowError::ActorClosed));
    assert_eq!(handle.stats().await, Err(FlowError::ActorClosed));
}
