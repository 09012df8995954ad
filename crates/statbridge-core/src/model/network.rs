//! Network statistic records.
//!
//! Interface counters come from `/proc/net/dev`, protocol counters from
//! `/proc/net/snmp` and `/proc/net/snmp6`, socket usage from
//! `/proc/net/sockstat{,6}`, NFS from `/proc/net/rpc/{nfs,nfsd}`.

use serde::{Deserialize, Serialize};

/// Softnet counters for one CPU. Record 0 is CPU "all".
///
/// Source: `/proc/net/softnet_stat`
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SoftnetStats {
    pub processed: u64,
    pub dropped: u64,
    pub time_squeeze: u64,
    pub received_rps: u64,
    pub flow_limit: u64,
    pub backlog_len: u64,
}

impl SoftnetStats {
    pub fn is_zero(&self) -> bool {
        *self == SoftnetStats::default()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NetDevStats {
    pub interface: String,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_compressed: u64,
    pub tx_compressed: u64,
    pub multicast: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NetEdevStats {
    pub interface: String,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub collisions: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub tx_carrier_errors: u64,
    pub rx_frame_errors: u64,
    pub rx_fifo_errors: u64,
    pub tx_fifo_errors: u64,
}

/// IPv4 socket usage.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SockStats {
    pub sock_inuse: u32,
    pub tcp_inuse: u32,
    pub udp_inuse: u32,
    pub raw_inuse: u32,
    pub frag_inuse: u32,
    pub tcp_tw: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IpStats {
    pub in_receives: u64,
    pub forw_datagrams: u64,
    pub in_delivers: u64,
    pub out_requests: u64,
    pub reasm_reqds: u64,
    pub reasm_oks: u64,
    pub frag_oks: u64,
    pub frag_creates: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EipStats {
    pub in_hdr_errors: u64,
    pub in_addr_errors: u64,
    pub in_unknown_protos: u64,
    pub in_discards: u64,
    pub out_discards: u64,
    pub out_no_routes: u64,
    pub reasm_fails: u64,
    pub frag_fails: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IcmpStats {
    pub in_msgs: u64,
    pub out_msgs: u64,
    pub in_echos: u64,
    pub in_echo_reps: u64,
    pub out_echos: u64,
    pub out_echo_reps: u64,
    pub in_timestamps: u64,
    pub in_timestamp_reps: u64,
    pub out_timestamps: u64,
    pub out_timestamp_reps: u64,
    pub in_addr_masks: u64,
    pub in_addr_mask_reps: u64,
    pub out_addr_masks: u64,
    pub out_addr_mask_reps: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EicmpStats {
    pub in_errors: u64,
    pub out_errors: u64,
    pub in_dest_unreachs: u64,
    pub out_dest_unreachs: u64,
    pub in_time_excds: u64,
    pub out_time_excds: u64,
    pub in_parm_probs: u64,
    pub out_parm_probs: u64,
    pub in_src_quenchs: u64,
    pub out_src_quenchs: u64,
    pub in_redirects: u64,
    pub out_redirects: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TcpStats {
    pub active_opens: u64,
    pub passive_opens: u64,
    pub in_segs: u64,
    pub out_segs: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EtcpStats {
    pub attempt_fails: u64,
    pub estab_resets: u64,
    pub retrans_segs: u64,
    pub in_errs: u64,
    pub out_rsts: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UdpStats {
    pub in_datagrams: u64,
    pub out_datagrams: u64,
    pub no_ports: u64,
    pub in_errors: u64,
}

/// IPv6 socket usage.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Sock6Stats {
    pub tcp6_inuse: u32,
    pub udp6_inuse: u32,
    pub raw6_inuse: u32,
    pub frag6_inuse: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Ip6Stats {
    pub in_receives: u64,
    pub out_forw_datagrams: u64,
    pub in_delivers: u64,
    pub out_requests: u64,
    pub reasm_reqds: u64,
    pub reasm_oks: u64,
    pub in_mcast_pkts: u64,
    pub out_mcast_pkts: u64,
    pub frag_oks: u64,
    pub frag_creates: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Eip6Stats {
    pub in_hdr_errors: u64,
    pub in_addr_errors: u64,
    pub in_unknown_protos: u64,
    pub in_too_big_errors: u64,
    pub in_discards: u64,
    pub out_discards: u64,
    pub in_no_routes: u64,
    pub out_no_routes: u64,
    pub reasm_fails: u64,
    pub frag_fails: u64,
    pub in_truncated_pkts: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Icmp6Stats {
    pub in_msgs: u64,
    pub out_msgs: u64,
    pub in_echos: u64,
    pub in_echo_replies: u64,
    pub out_echo_replies: u64,
    pub in_group_memb_queries: u64,
    pub in_group_memb_responses: u64,
    pub out_group_memb_responses: u64,
    pub in_group_memb_reductions: u64,
    pub out_group_memb_reductions: u64,
    pub in_router_solicits: u64,
    pub out_router_solicits: u64,
    pub in_router_advertisements: u64,
    pub in_neighbor_solicits: u64,
    pub out_neighbor_solicits: u64,
    pub in_neighbor_advertisements: u64,
    pub out_neighbor_advertisements: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Eicmp6Stats {
    pub in_errors: u64,
    pub in_dest_unreachs: u64,
    pub out_dest_unreachs: u64,
    pub in_time_excds: u64,
    pub out_time_excds: u64,
    pub in_parm_problems: u64,
    pub out_parm_problems: u64,
    pub in_redirects: u64,
    pub out_redirects: u64,
    pub in_pkt_too_bigs: u64,
    pub out_pkt_too_bigs: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Udp6Stats {
    pub in_datagrams: u64,
    pub out_datagrams: u64,
    pub no_ports: u64,
    pub in_errors: u64,
}

/// NFS client activity.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NfsStats {
    pub rpccnt: u32,
    pub rpcretrans: u32,
    pub readcnt: u32,
    pub writecnt: u32,
    pub accesscnt: u32,
    pub getattcnt: u32,
}

/// NFS server activity.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NfsdStats {
    pub rpccnt: u64,
    pub rpcbad: u64,
    pub netcnt: u64,
    pub netudpcnt: u64,
    pub nettcpcnt: u64,
    pub rchits: u64,
    pub rcmisses: u64,
    pub readcnt: u64,
    pub writecnt: u64,
    pub accesscnt: u64,
    pub getattcnt: u64,
}
