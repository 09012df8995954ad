//! Network interfaces, socket usage, SNMP counters and NFS.

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values, WireField, flat_group, item_selected};
use crate::activity::Activities;
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::pmid;
use crate::registry::{NFS_REQUEST_INSTANCES, domains};
use crate::value::{MetricValue, Semantics, Unit, ValueType};

// ---------------------------------------------------------------------------
// interfaces
// ---------------------------------------------------------------------------

const fn interface(item: u32, name: &'static str, unit: Unit) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 3, item),
        name,
        ValueType::U64,
        Semantics::Counter,
        Some(domains::NET_DEV),
        unit,
    )
}

/// Registers every selected interface seen in `names`.
fn define_interfaces<'a>(
    cx: &mut DefineCx<'_>,
    names: impl Iterator<Item = &'a String>,
) -> Result<(), SessionError> {
    cx.define_all()?;
    for name in names {
        if item_selected(cx.config.interfaces.as_ref(), name) {
            cx.sequential(domains::NET_DEV, name)?;
        }
    }
    Ok(())
}

/// Interface traffic.
pub struct NetDev;

impl StatGroup for NetDev {
    const NAME: &'static str = "net-dev";
    const METRICS: &'static [MetricDescriptor] = &[
        interface(1, "network.interface.in.packets", Unit::Count),
        interface(9, "network.interface.out.packets", Unit::Count),
        interface(0, "network.interface.in.bytes", Unit::Bytes),
        interface(8, "network.interface.out.bytes", Unit::Bytes),
        interface(6, "network.interface.in.compressed", Unit::Count),
        interface(15, "network.interface.out.compressed", Unit::Count),
        interface(7, "network.interface.in.mcasts", Unit::Count),
    ];

    fn present(acts: &Activities) -> bool {
        acts.net_dev.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let discovery = cx.discovery;
        let devs = discovery.iter().flat_map(|s| &s.net_dev);
        define_interfaces(cx, devs.map(|n| &n.interface))
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let devs = cx.acts.net_dev.records(cx.slot).to_vec();
        for n in devs.iter().take(cx.acts.net_dev.nr_ini()) {
            if !item_selected(cx.config.interfaces.as_ref(), &n.interface) {
                continue;
            }
            cx.instance(domains::NET_DEV, &n.interface)?;
            let values = [
                n.rx_packets,
                n.tx_packets,
                n.rx_bytes,
                n.tx_bytes,
                n.rx_compressed,
                n.tx_compressed,
                n.multicast,
            ];
            for (idx, v) in values.into_iter().enumerate() {
                cx.put(idx, Some(&n.interface), MetricValue::U64(v))?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(label) = cx.label(idx, *number) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let devs = &mut cx.acts.net_dev;
            let n = devs.record_by(cx.slot, |_, r| r.interface == label);
            n.interface = label.to_string();
            let field = match idx {
                0 => &mut n.rx_packets,
                1 => &mut n.tx_packets,
                2 => &mut n.rx_bytes,
                3 => &mut n.tx_bytes,
                4 => &mut n.rx_compressed,
                5 => &mut n.tx_compressed,
                _ => &mut n.multicast,
            };
            *field = v;
        }
    }
}

/// Interface errors.
pub struct NetEdev;

impl StatGroup for NetEdev {
    const NAME: &'static str = "net-edev";
    const METRICS: &'static [MetricDescriptor] = &[
        interface(2, "network.interface.in.errors", Unit::Count),
        interface(10, "network.interface.out.errors", Unit::Count),
        interface(13, "network.interface.collisions", Unit::Count),
        interface(3, "network.interface.in.drops", Unit::Count),
        interface(11, "network.interface.out.drops", Unit::Count),
        interface(14, "network.interface.out.carrier", Unit::Count),
        interface(5, "network.interface.in.frame", Unit::Count),
        interface(4, "network.interface.in.fifo", Unit::Count),
        interface(12, "network.interface.out.fifo", Unit::Count),
    ];

    fn present(acts: &Activities) -> bool {
        acts.net_edev.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let discovery = cx.discovery;
        let devs = discovery.iter().flat_map(|s| &s.net_edev);
        define_interfaces(cx, devs.map(|n| &n.interface))
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let devs = cx.acts.net_edev.records(cx.slot).to_vec();
        for n in devs.iter().take(cx.acts.net_edev.nr_ini()) {
            if !item_selected(cx.config.interfaces.as_ref(), &n.interface) {
                continue;
            }
            cx.instance(domains::NET_DEV, &n.interface)?;
            let values = [
                n.rx_errors,
                n.tx_errors,
                n.collisions,
                n.rx_dropped,
                n.tx_dropped,
                n.tx_carrier_errors,
                n.rx_frame_errors,
                n.rx_fifo_errors,
                n.tx_fifo_errors,
            ];
            for (idx, v) in values.into_iter().enumerate() {
                cx.put(idx, Some(&n.interface), MetricValue::U64(v))?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(label) = cx.label(idx, *number) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let devs = &mut cx.acts.net_edev;
            let n = devs.record_by(cx.slot, |_, r| r.interface == label);
            n.interface = label.to_string();
            let field = match idx {
                0 => &mut n.rx_errors,
                1 => &mut n.tx_errors,
                2 => &mut n.collisions,
                3 => &mut n.rx_dropped,
                4 => &mut n.tx_dropped,
                5 => &mut n.tx_carrier_errors,
                6 => &mut n.rx_frame_errors,
                7 => &mut n.rx_fifo_errors,
                _ => &mut n.tx_fifo_errors,
            };
            *field = v;
        }
    }
}

// ---------------------------------------------------------------------------
// sockets
// ---------------------------------------------------------------------------

flat_group! {
    /// IPv4 sockets in use.
    Sock, "sock", sock: crate::model::SockStats {
        sock_inuse => (11, 9, "network.sockstat.total", U32, Instant, None),
        tcp_inuse => (11, 0, "network.sockstat.tcp.inuse", U32, Instant, None),
        udp_inuse => (11, 3, "network.sockstat.udp.inuse", U32, Instant, None),
        raw_inuse => (11, 6, "network.sockstat.raw.inuse", U32, Instant, None),
        frag_inuse => (11, 15, "network.sockstat.frag.inuse", U32, Instant, None),
        tcp_tw => (11, 11, "network.sockstat.tcp.tw", U32, Instant, None),
    }
}

flat_group! {
    Sock6, "sock6", sock6: crate::model::Sock6Stats {
        tcp6_inuse => (73, 0, "network.sockstat.tcp6.inuse", U32, Instant, None),
        udp6_inuse => (73, 1, "network.sockstat.udp6.inuse", U32, Instant, None),
        raw6_inuse => (73, 3, "network.sockstat.raw6.inuse", U32, Instant, None),
        frag6_inuse => (73, 4, "network.sockstat.frag6.inuse", U32, Instant, None),
    }
}

// ---------------------------------------------------------------------------
// SNMP, IPv4
// ---------------------------------------------------------------------------

flat_group! {
    Ip, "ip", ip: crate::model::IpStats {
        in_receives => (14, 2, "network.ip.inreceives", U64, Counter, Count),
        forw_datagrams => (14, 5, "network.ip.forwdatagrams", U64, Counter, Count),
        in_delivers => (14, 8, "network.ip.indelivers", U64, Counter, Count),
        out_requests => (14, 9, "network.ip.outrequests", U64, Counter, Count),
        reasm_reqds => (14, 13, "network.ip.reasmreqds", U64, Counter, Count),
        reasm_oks => (14, 14, "network.ip.reasmoks", U64, Counter, Count),
        frag_oks => (14, 16, "network.ip.fragoks", U64, Counter, Count),
        frag_creates => (14, 18, "network.ip.fragcreates", U64, Counter, Count),
    }
}

flat_group! {
    /// IPv4 errors.
    Eip, "eip", eip: crate::model::EipStats {
        in_hdr_errors => (14, 3, "network.ip.inhdrerrors", U64, Counter, Count),
        in_addr_errors => (14, 4, "network.ip.inaddrerrors", U64, Counter, Count),
        in_unknown_protos => (14, 6, "network.ip.inunknownprotos", U64, Counter, Count),
        in_discards => (14, 7, "network.ip.indiscards", U64, Counter, Count),
        out_discards => (14, 10, "network.ip.outdiscards", U64, Counter, Count),
        out_no_routes => (14, 11, "network.ip.outnoroutes", U64, Counter, Count),
        reasm_fails => (14, 15, "network.ip.reasmfails", U64, Counter, Count),
        frag_fails => (14, 17, "network.ip.fragfails", U64, Counter, Count),
    }
}

flat_group! {
    Icmp, "icmp", icmp: crate::model::IcmpStats {
        in_msgs => (14, 20, "network.icmp.inmsgs", U64, Counter, Count),
        out_msgs => (14, 33, "network.icmp.outmsgs", U64, Counter, Count),
        in_echos => (14, 27, "network.icmp.inechos", U64, Counter, Count),
        in_echo_reps => (14, 28, "network.icmp.inechoreps", U64, Counter, Count),
        out_echos => (14, 40, "network.icmp.outechos", U64, Counter, Count),
        out_echo_reps => (14, 41, "network.icmp.outechoreps", U64, Counter, Count),
        in_timestamps => (14, 29, "network.icmp.intimestamps", U64, Counter, Count),
        in_timestamp_reps => (14, 30, "network.icmp.intimestampreps", U64, Counter, Count),
        out_timestamps => (14, 42, "network.icmp.outtimestamps", U64, Counter, Count),
        out_timestamp_reps => (14, 43, "network.icmp.outtimestampreps", U64, Counter, Count),
        in_addr_masks => (14, 31, "network.icmp.inaddrmasks", U64, Counter, Count),
        in_addr_mask_reps => (14, 32, "network.icmp.inaddrmaskreps", U64, Counter, Count),
        out_addr_masks => (14, 44, "network.icmp.outaddrmasks", U64, Counter, Count),
        out_addr_mask_reps => (14, 45, "network.icmp.outaddrmaskreps", U64, Counter, Count),
    }
}

flat_group! {
    Eicmp, "eicmp", eicmp: crate::model::EicmpStats {
        in_errors => (14, 21, "network.icmp.inerrors", U64, Counter, Count),
        out_errors => (14, 34, "network.icmp.outerrors", U64, Counter, Count),
        in_dest_unreachs => (14, 22, "network.icmp.indestunreachs", U64, Counter, Count),
        out_dest_unreachs => (14, 35, "network.icmp.outdestunreachs", U64, Counter, Count),
        in_time_excds => (14, 23, "network.icmp.intimeexcds", U64, Counter, Count),
        out_time_excds => (14, 36, "network.icmp.outtimeexcds", U64, Counter, Count),
        in_parm_probs => (14, 24, "network.icmp.inparmprobs", U64, Counter, Count),
        out_parm_probs => (14, 37, "network.icmp.outparmprobs", U64, Counter, Count),
        in_src_quenchs => (14, 25, "network.icmp.insrcquenchs", U64, Counter, Count),
        out_src_quenchs => (14, 38, "network.icmp.outsrcquenchs", U64, Counter, Count),
        in_redirects => (14, 26, "network.icmp.inredirects", U64, Counter, Count),
        out_redirects => (14, 39, "network.icmp.outredirects", U64, Counter, Count),
    }
}

flat_group! {
    Tcp, "tcp", tcp: crate::model::TcpStats {
        active_opens => (14, 54, "network.tcp.activeopens", U64, Counter, Count),
        passive_opens => (14, 55, "network.tcp.passiveopens", U64, Counter, Count),
        in_segs => (14, 59, "network.tcp.insegs", U64, Counter, Count),
        out_segs => (14, 60, "network.tcp.outsegs", U64, Counter, Count),
    }
}

flat_group! {
    Etcp, "etcp", etcp: crate::model::EtcpStats {
        attempt_fails => (14, 56, "network.tcp.attemptfails", U64, Counter, Count),
        estab_resets => (14, 57, "network.tcp.estabresets", U64, Counter, Count),
        retrans_segs => (14, 61, "network.tcp.retranssegs", U64, Counter, Count),
        in_errs => (14, 62, "network.tcp.inerrs", U64, Counter, Count),
        out_rsts => (14, 63, "network.tcp.outrsts", U64, Counter, Count),
    }
}

flat_group! {
    Udp, "udp", udp: crate::model::UdpStats {
        in_datagrams => (14, 70, "network.udp.indatagrams", U64, Counter, Count),
        out_datagrams => (14, 74, "network.udp.outdatagrams", U64, Counter, Count),
        no_ports => (14, 71, "network.udp.noports", U64, Counter, Count),
        in_errors => (14, 72, "network.udp.inerrors", U64, Counter, Count),
    }
}

// ---------------------------------------------------------------------------
// SNMP, IPv6
// ---------------------------------------------------------------------------

flat_group! {
    Ip6, "ip6", ip6: crate::model::Ip6Stats {
        in_receives => (58, 0, "network.ip6.inreceives", U64, Counter, Count),
        out_forw_datagrams => (58, 9, "network.ip6.outforwdatagrams", U64, Counter, Count),
        in_delivers => (58, 8, "network.ip6.indelivers", U64, Counter, Count),
        out_requests => (58, 10, "network.ip6.outrequests", U64, Counter, Count),
        reasm_reqds => (58, 14, "network.ip6.reasmreqds", U64, Counter, Count),
        reasm_oks => (58, 15, "network.ip6.reasmoks", U64, Counter, Count),
        in_mcast_pkts => (58, 20, "network.ip6.inmcastpkts", U64, Counter, Count),
        out_mcast_pkts => (58, 21, "network.ip6.outmcastpkts", U64, Counter, Count),
        frag_oks => (58, 17, "network.ip6.fragoks", U64, Counter, Count),
        frag_creates => (58, 19, "network.ip6.fragcreates", U64, Counter, Count),
    }
}

flat_group! {
    Eip6, "eip6", eip6: crate::model::Eip6Stats {
        in_hdr_errors => (58, 1, "network.ip6.inhdrerrors", U64, Counter, Count),
        in_addr_errors => (58, 4, "network.ip6.inaddrerrors", U64, Counter, Count),
        in_unknown_protos => (58, 5, "network.ip6.inunknownprotos", U64, Counter, Count),
        in_too_big_errors => (58, 2, "network.ip6.intoobigerrors", U64, Counter, Count),
        in_discards => (58, 7, "network.ip6.indiscards", U64, Counter, Count),
        out_discards => (58, 11, "network.ip6.outdiscards", U64, Counter, Count),
        in_no_routes => (58, 3, "network.ip6.innoroutes", U64, Counter, Count),
        out_no_routes => (58, 12, "network.ip6.outnoroutes", U64, Counter, Count),
        reasm_fails => (58, 16, "network.ip6.reasmfails", U64, Counter, Count),
        frag_fails => (58, 18, "network.ip6.fragfails", U64, Counter, Count),
        in_truncated_pkts => (58, 6, "network.ip6.intruncatedpkts", U64, Counter, Count),
    }
}

flat_group! {
    Icmp6, "icmp6", icmp6: crate::model::Icmp6Stats {
        in_msgs => (58, 32, "network.icmp6.inmsgs", U64, Counter, Count),
        out_msgs => (58, 34, "network.icmp6.outmsgs", U64, Counter, Count),
        in_echos => (58, 41, "network.icmp6.inechos", U64, Counter, Count),
        in_echo_replies => (58, 42, "network.icmp6.inechoreplies", U64, Counter, Count),
        out_echo_replies => (58, 57, "network.icmp6.outechoreplies", U64, Counter, Count),
        in_group_memb_queries => (58, 43, "network.icmp6.ingroupmembqueries", U64, Counter, Count),
        in_group_memb_responses => (58, 44, "network.icmp6.ingroupmembresponses", U64, Counter, Count),
        out_group_memb_responses => (58, 59, "network.icmp6.outgroupmembresponses", U64, Counter, Count),
        in_group_memb_reductions => (58, 45, "network.icmp6.ingroupmembreductions", U64, Counter, Count),
        out_group_memb_reductions => (58, 60, "network.icmp6.outgroupmembreductions", U64, Counter, Count),
        in_router_solicits => (58, 46, "network.icmp6.inroutersolicits", U64, Counter, Count),
        out_router_solicits => (58, 61, "network.icmp6.outroutersolicits", U64, Counter, Count),
        in_router_advertisements => (58, 47, "network.icmp6.inrouteradvertisements", U64, Counter, Count),
        in_neighbor_solicits => (58, 48, "network.icmp6.inneighborsolicits", U64, Counter, Count),
        out_neighbor_solicits => (58, 63, "network.icmp6.outneighborsolicits", U64, Counter, Count),
        in_neighbor_advertisements => (58, 49, "network.icmp6.inneighboradvertisements", U64, Counter, Count),
        out_neighbor_advertisements => (58, 64, "network.icmp6.outneighboradvertisements", U64, Counter, Count),
    }
}

flat_group! {
    Eicmp6, "eicmp6", eicmp6: crate::model::Eicmp6Stats {
        in_errors => (58, 33, "network.icmp6.inerrors", U64, Counter, Count),
        in_dest_unreachs => (58, 37, "network.icmp6.indestunreachs", U64, Counter, Count),
        out_dest_unreachs => (58, 52, "network.icmp6.outdestunreachs", U64, Counter, Count),
        in_time_excds => (58, 39, "network.icmp6.intimeexcds", U64, Counter, Count),
        out_time_excds => (58, 54, "network.icmp6.outtimeexcds", U64, Counter, Count),
        in_parm_problems => (58, 40, "network.icmp6.inparmproblems", U64, Counter, Count),
        out_parm_problems => (58, 55, "network.icmp6.outparmproblems", U64, Counter, Count),
        in_redirects => (58, 50, "network.icmp6.inredirects", U64, Counter, Count),
        out_redirects => (58, 65, "network.icmp6.outredirects", U64, Counter, Count),
        in_pkt_too_bigs => (58, 38, "network.icmp6.inpkttoobigs", U64, Counter, Count),
        out_pkt_too_bigs => (58, 53, "network.icmp6.outpkttoobigs", U64, Counter, Count),
    }
}

flat_group! {
    Udp6, "udp6", udp6: crate::model::Udp6Stats {
        in_datagrams => (58, 67, "network.udp6.indatagrams", U64, Counter, Count),
        out_datagrams => (58, 70, "network.udp6.outdatagrams", U64, Counter, Count),
        no_ports => (58, 68, "network.udp6.noports", U64, Counter, Count),
        in_errors => (58, 69, "network.udp6.inerrors", U64, Counter, Count),
    }
}

// ---------------------------------------------------------------------------
// NFS
// ---------------------------------------------------------------------------

const fn rpc(item: u32, name: &'static str, value_type: ValueType) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 7, item),
        name,
        value_type,
        Semantics::Counter,
        None,
        Unit::Count,
    )
}

const fn reqs(item: u32, name: &'static str, value_type: ValueType) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 7, item),
        name,
        value_type,
        Semantics::Counter,
        Some(domains::NFS_REQUEST),
        Unit::Count,
    )
}

/// Request counters in the order of [`NFS_REQUEST_INSTANCES`].
fn requests<T: Copy>(getattr: T, read: T, write: T, access: T) -> [(&'static str, T); 4] {
    let [(_, g), (_, r), (_, w), (_, a)] = NFS_REQUEST_INSTANCES;
    [(g, getattr), (r, read), (w, write), (a, access)]
}

/// NFS client RPC and request counts.
pub struct Nfs;

impl StatGroup for Nfs {
    const NAME: &'static str = "nfs";
    const METRICS: &'static [MetricDescriptor] = &[
        rpc(20, "rpc.client.rpccnt", ValueType::U32),
        rpc(21, "rpc.client.rpcretrans", ValueType::U32),
        reqs(4, "nfs.client.reqs", ValueType::U32),
    ];

    fn present(acts: &Activities) -> bool {
        acts.nfs.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        cx.fixed(domains::NFS_REQUEST, &NFS_REQUEST_INSTANCES)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(n) = cx.acts.nfs.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        cx.put(0, None, n.rpccnt.to_value())?;
        cx.put(1, None, n.rpcretrans.to_value())?;
        for (label, v) in requests(n.getattcnt, n.readcnt, n.writecnt, n.accesscnt) {
            cx.put(2, Some(label), v.to_value())?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(v) = cx.decode::<u32>(idx, value) else {
                continue;
            };
            let n = cx.acts.nfs.record_mut(slot, 0);
            let field = match (idx, number) {
                (0, _) => &mut n.rpccnt,
                (1, _) => &mut n.rpcretrans,
                (_, Some(4)) => &mut n.getattcnt,
                (_, Some(6)) => &mut n.readcnt,
                (_, Some(8)) => &mut n.writecnt,
                (_, Some(18)) => &mut n.accesscnt,
                _ => continue,
            };
            *field = v;
        }
    }
}

/// NFS server RPC, network and request counts.
pub struct Nfsd;

impl StatGroup for Nfsd {
    const NAME: &'static str = "nfsd";
    const METRICS: &'static [MetricDescriptor] = &[
        rpc(30, "rpc.server.rpccnt", ValueType::U64),
        rpc(34, "rpc.server.rpcbadclnt", ValueType::U64),
        rpc(44, "rpc.server.netcnt", ValueType::U64),
        rpc(45, "rpc.server.netudpcnt", ValueType::U64),
        rpc(46, "rpc.server.nettcpcnt", ValueType::U64),
        rpc(35, "rpc.server.rchits", ValueType::U64),
        rpc(36, "rpc.server.rcmisses", ValueType::U64),
        reqs(12, "nfs.server.reqs", ValueType::U64),
    ];

    fn present(acts: &Activities) -> bool {
        acts.nfsd.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        cx.fixed(domains::NFS_REQUEST, &NFS_REQUEST_INSTANCES)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(n) = cx.acts.nfsd.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        let singles = [
            n.rpccnt,
            n.rpcbad,
            n.netcnt,
            n.netudpcnt,
            n.nettcpcnt,
            n.rchits,
            n.rcmisses,
        ];
        for (idx, v) in singles.into_iter().enumerate() {
            cx.put(idx, None, MetricValue::U64(v))?;
        }
        for (label, v) in requests(n.getattcnt, n.readcnt, n.writecnt, n.accesscnt) {
            cx.put(7, Some(label), MetricValue::U64(v))?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let n = cx.acts.nfsd.record_mut(slot, 0);
            let field = match (idx, number) {
                (0, _) => &mut n.rpccnt,
                (1, _) => &mut n.rpcbad,
                (2, _) => &mut n.netcnt,
                (3, _) => &mut n.netudpcnt,
                (4, _) => &mut n.nettcpcnt,
                (5, _) => &mut n.rchits,
                (6, _) => &mut n.rcmisses,
                (_, Some(4)) => &mut n.getattcnt,
                (_, Some(6)) => &mut n.readcnt,
                (_, Some(8)) => &mut n.writecnt,
                (_, Some(18)) => &mut n.accesscnt,
                _ => continue,
            };
            *field = v;
        }
    }
}
