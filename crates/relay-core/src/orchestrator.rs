use std::sync::Arc;
use std::thread::JoinHandle;

use relay_comm::InterruptFlag;
use relay_config::RelayConfig;
use relay_net::{EgressGroup, RelayEndpoint};
use relay_spool::{DumpFormat, Spooler};
use relay_wire::{Codec, IdentityCodec, Mode, ZstdCodec};

use crate::egress::{BoundEgress, GroupEgress, InprocEgress};
use crate::error::RelayError;
use crate::ingress::Ingress;
use crate::keys::{PublishKey, SubscribeKey};
use crate::relay_loop::{RelayLoop, RelayLoopConfig};

/// Assembles one of the seven broker topologies (spec §4.5) from a merged
/// [`RelayConfig`] and drives it until interrupted. Each topology is one or
/// two [`RelayLoop`]s, each running on its own thread; `run` blocks until
/// every thread has returned (which happens once [`InterruptFlag`] is set
/// and each loop's shutdown drain completes).
pub struct Orchestrator {
    config: RelayConfig,
    mode: Mode,
    interrupt: InterruptFlag,
}

impl Orchestrator {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let raw_mode = config.mode.as_deref().unwrap_or("");
        let mode = Mode::parse_with_aliases(raw_mode).map_err(|_| RelayError::UnknownMode(raw_mode.to_owned()))?;
        let interrupt = InterruptFlag::new();
        interrupt.install()?;
        Ok(Self { config, mode, interrupt })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Builds and runs the configured mode's topology, blocking until every
    /// spawned pipeline thread has exited.
    pub fn run(&self) -> Result<(), RelayError> {
        let handles = match self.mode {
            Mode::Client => self.build_client()?,
            Mode::Publish => self.build_publish()?,
            Mode::Subscribe => self.build_subscribe()?,
            Mode::ClientPublish => self.build_client_publish()?,
            Mode::PublishSubscribe => self.build_publish_subscribe()?,
            Mode::ClientSubscribe => self.build_client_subscribe()?,
            Mode::StandAlone => self.build_stand_alone()?,
        };
        for handle in handles {
            join(handle);
        }
        Ok(())
    }

    /// `frontendpoint` bound ingress, `client_backendpoints` egress group,
    /// relayed through an in-process fan-in (spec §4.5, grounded on the
    /// original's shared `_client_backend` worker thread, reused unchanged
    /// by both CLIENT and the client half of CLIENT_SUBSCRIBE).
    fn build_client(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        self.spawn_client_fanin(
            required(&self.config.client_frontendpoint, Mode::Client, "client_frontendpoint")?,
            required(&self.config.client_backendpoints, Mode::Client, "client_backendpoints")?,
            self.config.client_dumpfile.as_deref(),
            self.config.client_dumptype.as_deref(),
        )
    }

    fn build_publish(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontendpoint =
            parse(required(&self.config.publish_frontendpoint, Mode::Publish, "publish_frontendpoint")?)?;
        let backendpoint =
            parse(required(&self.config.publish_backendpoint, Mode::Publish, "publish_backendpoint")?)?;

        let ingress = Ingress::bind(&frontendpoint)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let codec = self.build_codec();
        let publish_key = self.config.publish_sendkey.then(|| {
            PublishKey::new(self.config.publish_key.as_deref().unwrap_or(""), Some(codec.as_ref()))
        });

        let cfg = RelayLoopConfig { compress: Some(codec), publish_key, ..Default::default() };
        Ok(vec![self.spawn_loop(ingress, egress, None, cfg)])
    }

    /// `subscribe_frontendpoints` connect-multi ingress, `subscribe_key`/
    /// `subscribe_dropkey` filtering, `subscribe_backendpoint` bound
    /// broadcast egress.
    fn build_subscribe(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontendpoints = required(
            &self.config.subscribe_frontendpoints,
            Mode::Subscribe,
            "subscribe_frontendpoints",
        )?;
        let backendpoint =
            parse(required(&self.config.subscribe_backendpoint, Mode::Subscribe, "subscribe_backendpoint")?)?;

        let endpoints = relay_wire::parse_endpoint_list(frontendpoints)
            .iter()
            .map(|s| RelayEndpoint::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let ingress = Ingress::connect_multi(&endpoints)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let codec = self.build_codec();
        let spooler = self.build_spooler(
            self.config.subscribe_dumpfile.as_deref(),
            self.config.subscribe_dumptype.as_deref(),
        )?;
        let subscribe_key = self.build_subscribe_key(&codec);

        let cfg = RelayLoopConfig { decompress: Some(codec), subscribe_key, ..Default::default() };
        Ok(vec![self.spawn_loop(ingress, egress, spooler, cfg)])
    }

    /// `client_frontendpoint` bound ingress straight through to
    /// `publish_backendpoint`'s bound broadcast egress; no dump, no
    /// fan-in (spec §4.5: `has_dump` excludes this mode).
    fn build_client_publish(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontendpoint = parse(required(
            &self.config.client_frontendpoint,
            Mode::ClientPublish,
            "client_frontendpoint",
        )?)?;
        let backendpoint = parse(required(
            &self.config.publish_backendpoint,
            Mode::ClientPublish,
            "publish_backendpoint",
        )?)?;

        let ingress = Ingress::bind(&frontendpoint)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let codec = self.build_codec();
        let publish_key = self.config.publish_sendkey.then(|| {
            PublishKey::new(self.config.publish_key.as_deref().unwrap_or(""), Some(codec.as_ref()))
        });

        let cfg = RelayLoopConfig { compress: Some(codec), publish_key, ..Default::default() };
        Ok(vec![self.spawn_loop(ingress, egress, None, cfg)])
    }

    /// `publish_frontendpoint` bound ingress straight through to
    /// `subscribe_backendpoint`'s bound broadcast egress, with a dump
    /// spooler (spec §4.5: this mode carries `has_dump` but no key).
    fn build_publish_subscribe(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontendpoint = parse(required(
            &self.config.publish_frontendpoint,
            Mode::PublishSubscribe,
            "publish_frontendpoint",
        )?)?;
        let backendpoint = parse(required(
            &self.config.subscribe_backendpoint,
            Mode::PublishSubscribe,
            "subscribe_backendpoint",
        )?)?;

        let ingress = Ingress::bind(&frontendpoint)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let codec = self.build_codec();
        let spooler = self.build_spooler(
            self.config.subscribe_dumpfile.as_deref(),
            self.config.subscribe_dumptype.as_deref(),
        )?;

        let cfg = RelayLoopConfig { decompress: Some(codec), ..Default::default() };
        Ok(vec![self.spawn_loop(ingress, egress, spooler, cfg)])
    }

    /// The union of CLIENT and SUBSCRIBE: a client fan-in pipeline pair
    /// plus an independent subscribe pipeline, run concurrently on separate
    /// threads (spec §4.5; grounded on the original dispatching both
    /// `_client_backend` and its own subscribe relay loop from one process).
    fn build_client_subscribe(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let mut handles = self.spawn_client_fanin(
            required(&self.config.client_frontendpoint, Mode::ClientSubscribe, "client_frontendpoint")?,
            required(&self.config.client_backendpoints, Mode::ClientSubscribe, "client_backendpoints")?,
            self.config.client_dumpfile.as_deref(),
            self.config.client_dumptype.as_deref(),
        )?;

        let frontendpoints = required(
            &self.config.subscribe_frontendpoints,
            Mode::ClientSubscribe,
            "subscribe_frontendpoints",
        )?;
        let backendpoint = parse(required(
            &self.config.subscribe_backendpoint,
            Mode::ClientSubscribe,
            "subscribe_backendpoint",
        )?)?;

        let endpoints = relay_wire::parse_endpoint_list(frontendpoints)
            .iter()
            .map(|s| RelayEndpoint::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let ingress = Ingress::connect_multi(&endpoints)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let codec = self.build_codec();
        let spooler = self.build_spooler(
            self.config.subscribe_dumpfile.as_deref(),
            self.config.subscribe_dumptype.as_deref(),
        )?;
        let subscribe_key = self.build_subscribe_key(&codec);

        let cfg = RelayLoopConfig { decompress: Some(codec), subscribe_key, ..Default::default() };
        handles.push(self.spawn_loop(ingress, egress, spooler, cfg));
        Ok(handles)
    }

    /// `client_frontendpoint` bound ingress straight through to
    /// `subscribe_backendpoint`'s bound broadcast egress, with a dump
    /// spooler and no compression or key (spec §4.5).
    fn build_stand_alone(&self) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontendpoint = parse(required(
            &self.config.client_frontendpoint,
            Mode::StandAlone,
            "client_frontendpoint",
        )?)?;
        let backendpoint = parse(required(
            &self.config.subscribe_backendpoint,
            Mode::StandAlone,
            "subscribe_backendpoint",
        )?)?;

        let ingress = Ingress::bind(&frontendpoint)?;
        let egress = BoundEgress::bind(&backendpoint)?;
        let spooler = self.build_spooler(
            self.config.subscribe_dumpfile.as_deref(),
            self.config.subscribe_dumptype.as_deref(),
        )?;

        Ok(vec![self.spawn_loop(ingress, egress, spooler, RelayLoopConfig::default())])
    }

    /// Two-stage client pipeline: a front-end proxy (bound `frontend` ->
    /// in-process channel, no dump, no compression — a straight pass
    /// through, as the original's `zmq_proxy` call is) feeding a backend
    /// worker (in-process channel -> `backendpoints` egress group, with
    /// dump and compression).
    fn spawn_client_fanin(
        &self,
        frontend: &str,
        backendpoints: &str,
        dumpfile: Option<&str>,
        dumptype: Option<&str>,
    ) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let frontend = parse(frontend)?;
        let front_ingress = Ingress::bind(&frontend)?;

        let (tx, rx) = std::sync::mpsc::channel();
        let front_egress = InprocEgress::new(tx);
        let front_handle = self.spawn_loop(front_ingress, front_egress, None, RelayLoopConfig::default());

        let mut group = EgressGroup::init(backendpoints)?;
        group.start_monitors(self.interrupt.clone())?;
        let back_egress = GroupEgress::new(group);
        let back_ingress = Ingress::inproc(rx);
        let spooler = self.build_spooler(dumpfile, dumptype)?;
        let codec = self.build_codec();
        let cfg = RelayLoopConfig { compress: Some(codec), ..Default::default() };
        let back_handle = self.spawn_loop(back_ingress, back_egress, spooler, cfg);

        Ok(vec![front_handle, back_handle])
    }

    fn spawn_loop<E: crate::egress::Egress + 'static>(
        &self,
        ingress: Ingress,
        egress: E,
        spooler: Option<Spooler>,
        cfg: RelayLoopConfig,
    ) -> JoinHandle<()> {
        let interrupt = self.interrupt.clone();
        std::thread::spawn(move || {
            let mut relay_loop = RelayLoop::new(ingress, egress, spooler, interrupt, cfg);
            relay_loop.run();
        })
    }

    /// Built whenever a key filter or drop-key stripping is configured, even
    /// with an empty key (matching the original, which always subscribes
    /// with `subscribe_key` defaulted to `""` and always consults
    /// `subscribe_dropkey` regardless of whether a key is set).
    fn build_subscribe_key(&self, codec: &Arc<dyn Codec>) -> Option<SubscribeKey> {
        if self.config.subscribe_key.is_none() && !self.config.subscribe_dropkey {
            return None;
        }
        let key = self.config.subscribe_key.as_deref().unwrap_or("");
        Some(SubscribeKey::new(key, self.config.subscribe_dropkey, Some(codec.as_ref())))
    }

    fn build_codec(&self) -> Arc<dyn Codec> {
        match self.config.compression.as_deref() {
            Some("identity") => Arc::new(IdentityCodec),
            _ => Arc::new(ZstdCodec::new(self.config.zstd_level.unwrap_or(3))),
        }
    }

    fn build_spooler(&self, path: Option<&str>, format: Option<&str>) -> Result<Option<Spooler>, RelayError> {
        if !self.mode.has_dump() {
            return Ok(None);
        }
        let Some(path) = path.filter(|p| !p.is_empty()) else { return Ok(None) };
        let format = match format {
            Some(raw) => raw.parse::<DumpFormat>()?,
            None => DumpFormat::Binary,
        };
        let spooler = Spooler::init(path, format)?.with_codec(self.build_codec());
        Ok(Some(spooler))
    }
}

fn required<'a>(field: &'a Option<String>, mode: Mode, name: &'static str) -> Result<&'a str, RelayError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RelayError::MissingEndpoint { mode, field: name }),
    }
}

fn parse(raw: &str) -> Result<RelayEndpoint, RelayError> {
    Ok(RelayEndpoint::parse(raw)?)
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("relay-core: pipeline thread panicked");
    }
}
