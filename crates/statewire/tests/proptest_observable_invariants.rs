//! Property-based invariant tests for observable notification.
//!
//! These hold for any number of listeners and any disposal pattern:
//!
//! 1. A write calls every active listener exactly once, in subscription
//!    order, with the written value.
//! 2. Disposed listeners are never called; disposing twice changes nothing.
//! 3. A single failing listener never stops the others, and the write
//!    reports exactly one failure naming that subscription.
//! 4. `version` equals the number of writes.
//! 5. After teardown every value operation fails with a lifecycle error.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use statewire::{Disposer, Observable, ObservableConfig};

type Log = Rc<RefCell<Vec<(usize, i32)>>>;

fn subscribe_logging(obs: &Observable<i32>, count: usize, log: &Log) -> Vec<Disposer> {
    (0..count)
        .map(|idx| {
            let log = Rc::clone(log);
            obs.subscribe(move |v: &i32| log.borrow_mut().push((idx, *v)))
                .expect("subscribe")
        })
        .collect()
}

proptest! {
    #[test]
    fn write_notifies_each_listener_once_in_order(
        count in 0usize..24,
        value in any::<i32>(),
    ) {
        let obs = Observable::new(0);
        let log: Log = Rc::default();
        let _disposers = subscribe_logging(&obs, count, &log);

        obs.write(value).unwrap();

        let expected: Vec<(usize, i32)> = (0..count).map(|idx| (idx, value)).collect();
        prop_assert_eq!(&*log.borrow(), &expected);
    }

    #[test]
    fn disposed_listeners_are_skipped(
        mask in proptest::collection::vec(any::<bool>(), 0..24),
        value in any::<i32>(),
    ) {
        let obs = Observable::new(0);
        let log: Log = Rc::default();
        let disposers = subscribe_logging(&obs, mask.len(), &log);

        for (disposer, remove) in disposers.iter().zip(&mask) {
            if *remove {
                disposer.dispose();
                disposer.dispose();
            }
        }

        obs.write(value).unwrap();

        let expected: Vec<(usize, i32)> = mask
            .iter()
            .enumerate()
            .filter(|(_, remove)| !**remove)
            .map(|(idx, _)| (idx, value))
            .collect();
        prop_assert_eq!(&*log.borrow(), &expected);
        prop_assert_eq!(obs.subscriber_count(), expected.len());
        prop_assert_eq!(obs.has_subscribers(), !expected.is_empty());
    }

    #[test]
    fn single_failure_is_isolated(
        (count, failing) in (1usize..16).prop_flat_map(|n| (Just(n), 0..n)),
    ) {
        let obs = Observable::with_config(0, ObservableConfig::new().with_error_sink(|_, _| {}));
        let ran = Rc::new(RefCell::new(Vec::new()));
        let mut ids = Vec::new();

        for idx in 0..count {
            let ran = Rc::clone(&ran);
            let disposer = obs
                .subscribe(move |_: &i32| {
                    ran.borrow_mut().push(idx);
                    if idx == failing { Err("planned failure") } else { Ok(()) }
                })
                .unwrap();
            ids.push(disposer.id());
        }

        let err = obs.write(1).unwrap_err();
        let agg = err.as_listeners().expect("aggregate");

        prop_assert_eq!(agg.len(), 1);
        prop_assert_eq!(agg.failures()[0].subscription, ids[failing]);
        prop_assert_eq!(agg.origin().id, obs.id());
        prop_assert_eq!(&*ran.borrow(), &(0..count).collect::<Vec<_>>());
        prop_assert_eq!(obs.read().unwrap(), 1);
    }

    #[test]
    fn version_counts_writes(values in proptest::collection::vec(any::<i32>(), 0..64)) {
        let obs = Observable::new(0);
        for v in &values {
            obs.write(*v).unwrap();
        }
        prop_assert_eq!(obs.version(), values.len() as u64);
        if let Some(last) = values.last() {
            prop_assert_eq!(obs.read().unwrap(), *last);
        }
    }

    #[test]
    fn teardown_is_terminal(count in 0usize..8, value in any::<i32>()) {
        let obs = Observable::new(value);
        let log: Log = Rc::default();
        let disposers = subscribe_logging(&obs, count, &log);

        obs.dispose();
        obs.dispose();
        for disposer in &disposers {
            disposer.dispose();
        }

        prop_assert!(!obs.is_alive());
        prop_assert!(!obs.has_subscribers());
        prop_assert!(obs.read().unwrap_err().is_disposed());
        prop_assert!(obs.write(value).unwrap_err().is_disposed());
        let subscribe_result = obs.subscribe(|_: &i32| {});
        prop_assert!(subscribe_result.unwrap_err().is_disposed());
        prop_assert!(log.borrow().is_empty());
    }
}
