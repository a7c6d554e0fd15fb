//! Positional joins over heterogeneous nodes.
//!
//! A join produces the tuple of its upstream values in the given order and
//! subscribes to every listed upstream. An optional upstream is expressed as
//! `Option<P>`: an absent provider still occupies its slot, yielding `None`
//! rather than shifting later values.

use crate::node::{Cached, NodeHandle, Provider};

/// An absent-or-present upstream slot. `None` contributes `None` to the
/// tuple and has nothing to subscribe to.
impl<T, P> Provider<Option<T>> for Option<P>
where
    T: Clone + 'static,
    P: Provider<T>,
{
    fn get(&self) -> Option<T> {
        self.as_ref().map(Provider::get)
    }

    fn attach(&self, subscriber: NodeHandle) {
        if let Some(provider) = self {
            provider.attach(subscriber);
        }
    }
}

/// Join three nodes into a triple-producing node.
pub fn join3<A, B, C, PA, PB, PC>(a: &PA, b: &PB, c: &PC) -> Cached<(A, B, C)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    PA: Provider<A>,
    PB: Provider<B>,
    PC: Provider<C>,
{
    let (pa, pb, pc) = (a.clone(), b.clone(), c.clone());
    let node = Cached::new(move || (pa.get(), pb.get(), pc.get()));
    a.attach(node.handle());
    b.attach(node.handle());
    c.attach(node.handle());
    node
}

/// Join four nodes into a 4-tuple-producing node.
pub fn join4<A, B, C, D, PA, PB, PC, PD>(
    a: &PA,
    b: &PB,
    c: &PC,
    d: &PD,
) -> Cached<(A, B, C, D)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    D: Clone + 'static,
    PA: Provider<A>,
    PB: Provider<B>,
    PC: Provider<C>,
    PD: Provider<D>,
{
    let (pa, pb, pc, pd) = (a.clone(), b.clone(), c.clone(), d.clone());
    let node = Cached::new(move || (pa.get(), pb.get(), pc.get(), pd.get()));
    a.attach(node.handle());
    b.attach(node.handle());
    c.attach(node.handle());
    d.attach(node.handle());
    node
}

/// Join five nodes into a 5-tuple-producing node.
pub fn join5<A, B, C, D, E, PA, PB, PC, PD, PE>(
    a: &PA,
    b: &PB,
    c: &PC,
    d: &PD,
    e: &PE,
) -> Cached<(A, B, C, D, E)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    D: Clone + 'static,
    E: Clone + 'static,
    PA: Provider<A>,
    PB: Provider<B>,
    PC: Provider<C>,
    PD: Provider<D>,
    PE: Provider<E>,
{
    let (pa, pb, pc, pd, pe) = (a.clone(), b.clone(), c.clone(), d.clone(), e.clone());
    let node = Cached::new(move || (pa.get(), pb.get(), pc.get(), pd.get(), pe.get()));
    a.attach(node.handle());
    b.attach(node.handle());
    c.attach(node.handle());
    d.attach(node.handle());
    e.attach(node.handle());
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Source;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn join_pairs_in_order() {
        let a = Source::new("left");
        let b = Source::new(7);
        let joined = a.join(&b);
        assert_eq!(joined.get(), ("left", 7));
    }

    #[test]
    fn join_tracks_all_upstreams() {
        let a = Source::new(1);
        let b = Source::new(2);
        let c = Source::new(3);
        let joined = join3(&a, &b, &c);
        assert_eq!(joined.get(), (1, 2, 3));

        b.set(20);
        assert_eq!(joined.get(), (1, 20, 3));

        c.set(30);
        assert_eq!(joined.get(), (1, 20, 30));
    }

    #[test]
    fn absent_slot_keeps_position() {
        let a = Source::new(1);
        let b: Option<Source<i32>> = None;
        let c = Source::new(3);
        let joined = join3(&a, &b, &c);
        assert_eq!(joined.get(), (1, None, 3));
    }

    #[test]
    fn present_optional_slot_participates() {
        let a = Source::new(1);
        let b = Some(Source::new(2));
        let joined = a.join(&b);
        assert_eq!(joined.get(), (1, Some(2)));

        // A present optional upstream still invalidates the join.
        b.as_ref().unwrap().set(9);
        assert_eq!(joined.get(), (1, Some(9)));
    }

    #[test]
    fn join_memoizes_across_gets() {
        let runs = Rc::new(Cell::new(0));
        let probe = runs.clone();
        let a = Source::new(1);
        let b = Source::new(2);
        let joined = join4(&a, &b, &a, &b).map(move |t| {
            runs.set(runs.get() + 1);
            t
        });

        joined.get();
        joined.get();
        assert_eq!(probe.get(), 1);

        a.set(5);
        assert_eq!(joined.get(), (5, 2, 5, 2));
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn join5_width() {
        let a = Source::new(1u8);
        let b = Source::new(2u16);
        let c = Source::new(3u32);
        let d = Source::new(4u64);
        let e = Source::new("five");
        let joined = join5(&a, &b, &c, &d, &e);
        assert_eq!(joined.get(), (1, 2, 3, 4, "five"));
    }
}
