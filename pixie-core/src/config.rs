//! pixiev6 configs

pub mod cli {
    //! Parse from either cli or env var

    /// first pool address
    pub static DEFAULT_POOL_START: &str = "2001:db8:f00f:cafe::10";
    /// last pool address
    pub static DEFAULT_POOL_END: &str = "2001:db8:f00f:cafe::100";
    /// default preferred lifetime in seconds
    pub const DEFAULT_PREFERRED_LIFETIME: u64 = 1800;
    /// default valid lifetime in seconds
    pub const DEFAULT_VALID_LIFETIME: u64 = 1850;
    /// tokio worker thread name
    pub static DEFAULT_THREAD_NAME: &str = "pixiev6-dhcp-worker";
    /// default log level. Can use this argument or PIXIE_LOG env var
    pub const DEFAULT_PIXIE_LOG: &str = "info";
    /// log as "json", "pretty" or "standard" (unstructured)
    pub const DEFAULT_LOG_FORMAT: &str = "standard";

    use std::{net::Ipv6Addr, time::Duration};

    pub use clap::Parser;
    use dhcp6::StaticBootConfiguration;

    use crate::server::{LeaseTimes, DEFAULT_PORT};

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "pixiev6", bin_name = "pixiev6", about, long_about = None)]
    /// parses from cli & environment var. pixiev6 will load `.env` in the same dir as the binary as well
    pub struct Config {
        /// address to listen on, its interface is used for the server DUID. Unset picks the first usable interface
        #[clap(long, env = "PIXIE_ADDR", value_parser)]
        pub addr: Option<String>,
        /// port to listen on
        #[clap(long, env = "PIXIE_PORT", value_parser, default_value = DEFAULT_PORT)]
        pub port: String,
        /// boot file URL for UEFI HTTP boot clients
        #[clap(long, env = "PIXIE_HTTP_BOOT_URL", value_parser)]
        pub http_boot_url: Option<String>,
        /// boot file URL for every other client (iPXE)
        #[clap(long, env = "PIXIE_IPXE_URL", value_parser)]
        pub ipxe_url: Option<String>,
        /// server preference to advertise
        #[clap(long, env = "PIXIE_PREFERENCE", value_parser)]
        pub preference: Option<u8>,
        /// recursive DNS servers to advertise
        #[clap(long, env = "PIXIE_DNS", value_parser, value_delimiter = ',')]
        pub dns: Vec<Ipv6Addr>,
        /// first address handed out
        #[clap(long, env = "PIXIE_POOL_START", value_parser, default_value = DEFAULT_POOL_START)]
        pub pool_start: Ipv6Addr,
        /// last address handed out
        #[clap(long, env = "PIXIE_POOL_END", value_parser, default_value = DEFAULT_POOL_END)]
        pub pool_end: Ipv6Addr,
        /// preferred lifetime in seconds
        #[clap(long, env = "PIXIE_PREFERRED_LIFETIME", value_parser, default_value_t = DEFAULT_PREFERRED_LIFETIME)]
        pub preferred_lifetime: u64,
        /// valid lifetime in seconds, also how long an address stays reserved
        #[clap(long, env = "PIXIE_VALID_LIFETIME", value_parser, default_value_t = DEFAULT_VALID_LIFETIME)]
        pub valid_lifetime: u64,
        /// Worker thread name
        #[clap(long, env = "PIXIE_THREAD_NAME", value_parser, default_value = DEFAULT_THREAD_NAME)]
        pub thread_name: String,
        /// number of tokio worker threads, defaults to the number of logical CPUs
        #[clap(long, env = "PIXIE_THREADS", value_parser)]
        pub threads: Option<usize>,
        /// set the log level. All valid RUST_LOG arguments are accepted
        #[clap(long, env = "PIXIE_LOG", value_parser, default_value = DEFAULT_PIXIE_LOG)]
        pub pixie_log: String,
        /// log format: "json", "pretty" or "standard"
        #[clap(long, env = "LOG_FORMAT", value_parser, default_value = DEFAULT_LOG_FORMAT)]
        pub log_format: String,
    }

    impl Config {
        /// boot parameters from the boot url/preference/dns flags
        pub fn boot_config(&self) -> StaticBootConfiguration {
            StaticBootConfiguration {
                http_boot_url: self.http_boot_url.clone(),
                ipxe_url: self.ipxe_url.clone(),
                preference: self.preference,
                recursive_dns: self.dns.clone(),
            }
        }

        /// lease lifetimes as `Duration`s
        pub fn lease_times(&self) -> LeaseTimes {
            LeaseTimes {
                preferred: Duration::from_secs(self.preferred_lifetime),
                valid: Duration::from_secs(self.valid_lifetime),
            }
        }

        /// is any boot url configured? without one no client gets an answer
        pub fn has_boot_url(&self) -> bool {
            self.http_boot_url.is_some() || self.ipxe_url.is_some()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parse_args() {
            let cfg = Config::try_parse_from([
                "pixiev6",
                "--ipxe-url",
                "http://[2001:db8::1]/boot.ipxe",
                "--dns",
                "2001:db8::53,2001:db8::54",
                "--preference",
                "255",
                "--port",
                "5547",
            ])
            .unwrap();
            assert_eq!(cfg.port, "5547");
            assert!(cfg.has_boot_url());
            let boot = cfg.boot_config();
            assert_eq!(boot.ipxe_url.as_deref(), Some("http://[2001:db8::1]/boot.ipxe"));
            assert_eq!(boot.preference, Some(255));
            assert_eq!(boot.recursive_dns.len(), 2);
        }

        #[test]
        fn lease_times_from_secs() {
            let cfg = Config::try_parse_from([
                "pixiev6",
                "--preferred-lifetime",
                "60",
                "--valid-lifetime",
                "90",
            ])
            .unwrap();
            let lease = cfg.lease_times();
            assert_eq!(lease.preferred, Duration::from_secs(60));
            assert_eq!(lease.valid, Duration::from_secs(90));
        }

        #[test]
        fn rejects_bad_pool_address() {
            assert!(Config::try_parse_from(["pixiev6", "--pool-start", "10.0.0.1"]).is_err());
        }
    }
}

pub mod trace {
    //! tracing configuration
    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// Configuration for `tracing` output
    #[derive(Debug)]
    pub struct Config {
        /// formatting to apply to logs
        pub log_frmt: String,
    }

    impl Config {
        /// Install the global subscriber. `pixie_log` is an `EnvFilter`
        /// directive, `log_frmt` is "json", "pretty" or anything else for
        /// standard output.
        pub fn parse(pixie_log: &str, log_frmt: &str) -> Result<Self> {
            let filter = EnvFilter::try_new(pixie_log).or_else(|_| EnvFilter::try_new("info"))?;

            match log_frmt {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "pretty" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            fmt::layer()
                                .event_format(
                                    Format::default().pretty().with_source_location(false),
                                )
                                .fmt_fields(PrettyFields::new()),
                        )
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer())
                        .init();
                }
            }

            Ok(Self {
                log_frmt: log_frmt.to_owned(),
            })
        }
    }
}
