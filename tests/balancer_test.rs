use actor_flow::{Balancer, Inspect, MarkovBalancer, RoundRobin, WeightBalancer};
use flow_framework::mock::Probe;

#[tokio::test]
async fn round_robin_rotates_through_every_output() {
    let (balancer, handle) = Balancer::new(RoundRobin::new(3).unwrap());
    tokio::spawn(balancer.run());
    let mut probes: Vec<_> = handle.outputs().iter().map(Probe::attached).collect();

    for n in 1..=9u32 {
        handle.input().send(n).unwrap();
    }
    let stats = handle.stats().await.unwrap();

    assert_eq!(probes[0].drain(), vec![1, 4, 7]);
    assert_eq!(probes[1].drain(), vec![2, 5, 8]);
    assert_eq!(probes[2].drain(), vec![3, 6, 9]);
    assert_eq!(stats.strategy, "round-robin");
    assert_eq!(stats.routed, vec![3, 3, 3]);
    assert_eq!(stats.unrouted, 0);
}

#[tokio::test]
async fn weight_balancer_sends_heavy_and_light_work_apart() {
    let strategy = WeightBalancer::new(2, |cost: &u64| *cost).unwrap();
    let (balancer, handle) = Balancer::new(strategy);
    tokio::spawn(balancer.run());
    let mut first = Probe::attached(handle.output(0).unwrap());
    let mut second = Probe::attached(handle.output(1).unwrap());

    for cost in [10, 1, 1, 1, 1] {
        handle.input().send(cost).unwrap();
    }
    let stats = handle.stats().await.unwrap();

    assert_eq!(first.drain(), vec![10]);
    assert_eq!(second.drain(), vec![1, 1, 1, 1]);
    assert_eq!(stats.costs, vec![10, 4]);
    assert_eq!(stats.routed, vec![1, 4]);
}

#[tokio::test]
async fn every_message_goes_to_exactly_one_output() {
    let strategy = WeightBalancer::new(4, |n: &u32| u64::from(*n % 7)).unwrap();
    let (balancer, handle) = Balancer::new(strategy);
    tokio::spawn(balancer.run());
    let mut probes: Vec<_> = handle.outputs().iter().map(Probe::attached).collect();

    for n in 0..200u32 {
        handle.input().send(n).unwrap();
    }
    handle.stats().await.unwrap();

    let mut seen: Vec<u32> = probes.iter_mut().flat_map(|probe| probe.drain()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..200).collect::<Vec<_>>());
}

#[tokio::test]
async fn markov_balancer_counts_unrouted_messages() {
    // The last threshold stops at one half, so roughly half the draws miss.
    let strategy = MarkovBalancer::new(b"markov", vec![0.25, 0.5]).unwrap();
    let (balancer, handle) = Balancer::new(strategy);
    tokio::spawn(balancer.run());
    let mut low = Probe::attached(handle.output(0).unwrap());
    let mut high = Probe::attached(handle.output(1).unwrap());

    for n in 0..1_000u32 {
        handle.input().send(n).unwrap();
    }
    let stats = handle.stats().await.unwrap();

    let routed = low.drain().len() + high.drain().len();
    assert_eq!(stats.strategy, "weighted-random");
    assert_eq!(routed as u64 + stats.unrouted, 1_000);
    assert!(stats.unrouted > 350 && stats.unrouted < 650, "{stats:?}");
    assert_eq!(stats.routed.iter().sum::<u64>(), routed as u64);
}

#[tokio::test]
async fn markov_balancers_with_equal_seeds_route_identically() {
    async fn routes(seed: &[u8]) -> Vec<u32> {
        let strategy = MarkovBalancer::new(seed, vec![0.3, 0.6, 1.0]).unwrap();
        let (balancer, handle) = Balancer::new(strategy);
        tokio::spawn(balancer.run());
        let mut probe = Probe::attached(handle.output(1).unwrap());
        for n in 0..100u32 {
            handle.input().send(n).unwrap();
        }
        handle.stats().await.unwrap();
        probe.drain()
    }

    assert_eq!(routes(b"same seed").await, routes(b"same seed").await);
}

#[test]
fn zero_destinations_are_rejected() {
    assert!(RoundRobin::new(0).is_err());
    assert!(WeightBalancer::<u32>::new(0, |_| 1).is_err());
    assert!(MarkovBalancer::new(b"seed", Vec::new()).is_err());
}
