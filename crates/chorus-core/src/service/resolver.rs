//! Best-match service resolution.
//!
//! For each capability the profile holds a priority-ordered list of service
//! links. Resolution walks the list and accepts the first backend whose own
//! `initialize` reports it can serve the session's prerequisites. A
//! preferred override short-circuits the walk: only that link is tried and
//! its failure is reported without falling back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chorus_types::error::{ResolveError, ServiceError};
use chorus_types::service::{
    ServiceCategory, ServiceInstanceConfig, ServiceLink, ServiceProfile, ServicesList,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::action::BoxActionInference;
use super::backend::ServiceInit;
use super::registry::{RegisteredService, ServiceRegistry};
use super::speech_to_text::BoxSpeechToText;
use super::summarization::BoxSummarization;
use super::text_gen::BoxTextGen;
use super::text_to_speech::BoxTextToSpeech;

/// A backend chosen by the resolver, with the link that selected it.
pub struct Resolved<S> {
    pub service: S,
    /// Link pinned to the concrete instance id.
    pub link: ServiceLink,
}

/// Resolves backends from the registry and the configured instances.
pub struct ServiceResolver {
    registry: Arc<ServiceRegistry>,
    instances: Vec<ServiceInstanceConfig>,
}

/// Outcome of trying a single link.
enum Attempt<S> {
    Accepted(Resolved<S>),
    Skipped(&'static str),
}

impl ServiceResolver {
    pub fn new(registry: Arc<ServiceRegistry>, instances: Vec<ServiceInstanceConfig>) -> Self {
        Self {
            registry,
            instances,
        }
    }

    /// Configured instance for a link: by id when pinned, else the first
    /// instance with the link's service name.
    fn instance_for(&self, link: &ServiceLink) -> Option<&ServiceInstanceConfig> {
        match link.service_id {
            Some(id) => self.instances.iter().find(|i| i.id == id),
            None => self
                .instances
                .iter()
                .find(|i| i.service_name == link.service_name),
        }
    }

    /// Pick one ready backend of type `S`.
    #[tracing::instrument(name = "resolve", skip_all, fields(category = %S::CATEGORY))]
    pub async fn resolve<S: RegisteredService>(
        &self,
        list: &ServicesList,
        preferred: Option<&ServiceLink>,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<Resolved<S>, ResolveError> {
        if let Some(link) = preferred {
            return match self.try_link::<S>(link, init, cancel).await {
                Ok(Attempt::Accepted(resolved)) => Ok(resolved),
                Ok(Attempt::Skipped(reason)) => {
                    warn!(service = %link, reason, "preferred service unavailable");
                    Err(ResolveError::PreferredUnavailable {
                        category: S::CATEGORY,
                        service: link.to_string(),
                    })
                }
                Err(source) => Err(ResolveError::Initialization {
                    category: S::CATEGORY,
                    source,
                }),
            };
        }

        for link in &list.services {
            match self.try_link::<S>(link, init, cancel).await {
                Ok(Attempt::Accepted(resolved)) => return Ok(resolved),
                Ok(Attempt::Skipped(reason)) => {
                    debug!(service = %link, reason, "skipping service");
                }
                Err(ServiceError::Cancelled) => {
                    return Err(ResolveError::Initialization {
                        category: S::CATEGORY,
                        source: ServiceError::Cancelled,
                    });
                }
                Err(e) => {
                    warn!(service = %link, error = %e, "service failed to initialize, trying next");
                }
            }
        }

        Err(ResolveError::NoCompatibleService {
            category: S::CATEGORY,
            prerequisites: init.prerequisites.to_string(),
            culture: init.culture.clone(),
        })
    }

    async fn try_link<S: RegisteredService>(
        &self,
        link: &ServiceLink,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<Attempt<S>, ServiceError> {
        let Some(instance) = self.instance_for(link) else {
            return Ok(Attempt::Skipped("no configured instance"));
        };
        if !instance.enabled {
            return Ok(Attempt::Skipped("instance disabled"));
        }
        let Some(factory) = self.registry.factory::<S>(&instance.service_name) else {
            return Ok(Attempt::Skipped("service not registered"));
        };

        let service = factory(instance)?;
        match service.initialize(init, cancel).await {
            Ok(true) => {
                info!(service = %instance.service_name, instance = %instance.id, "service resolved");
                Ok(Attempt::Accepted(Resolved {
                    service,
                    link: ServiceLink {
                        service_name: instance.service_name.clone(),
                        service_id: Some(instance.id),
                    },
                }))
            }
            Ok(false) => {
                service.dispose().await;
                Ok(Attempt::Skipped("incompatible with prerequisites"))
            }
            Err(e) => {
                service.dispose().await;
                Err(e)
            }
        }
    }

    /// Resolve every capability a session needs.
    ///
    /// Text generation is mandatory. Other capabilities resolve to `None`
    /// when neither a priority list nor a preferred override is configured.
    /// On failure, every backend created so far is disposed before the
    /// error is returned.
    pub async fn resolve_session(
        &self,
        profile: &ServiceProfile,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<SessionServices, ResolveError> {
        let text_gen = self
            .resolve::<BoxTextGen>(
                profile.list(ServiceCategory::TextGen),
                profile.preferred.get(ServiceCategory::TextGen),
                init,
                cancel,
            )
            .await?;

        let mut services = SessionServices::new(text_gen.service);
        services.links.insert(ServiceCategory::TextGen, text_gen.link);

        if let Err(e) = self.resolve_optional(&mut services, profile, init, cancel).await {
            services.dispose().await;
            return Err(e);
        }
        Ok(services)
    }

    async fn resolve_optional(
        &self,
        services: &mut SessionServices,
        profile: &ServiceProfile,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<(), ResolveError> {
        if let Some(r) = self.resolve_if_configured::<BoxTextToSpeech>(profile, init, cancel).await? {
            services.links.insert(ServiceCategory::TextToSpeech, r.link);
            services.text_to_speech = Some(Arc::new(r.service));
        }
        if let Some(r) = self.resolve_if_configured::<BoxSpeechToText>(profile, init, cancel).await? {
            services.links.insert(ServiceCategory::SpeechToText, r.link);
            services.speech_to_text = Some(Arc::new(r.service));
        }
        if let Some(r) = self
            .resolve_if_configured::<BoxActionInference>(profile, init, cancel)
            .await?
        {
            services.links.insert(ServiceCategory::ActionInference, r.link);
            services.action_inference = Some(Arc::new(r.service));
        }
        if let Some(r) = self.resolve_if_configured::<BoxSummarization>(profile, init, cancel).await? {
            services.links.insert(ServiceCategory::Summarization, r.link);
            services.summarization = Some(Arc::new(r.service));
        }
        Ok(())
    }

    async fn resolve_if_configured<S: RegisteredService>(
        &self,
        profile: &ServiceProfile,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<Option<Resolved<S>>, ResolveError> {
        let list = profile.list(S::CATEGORY);
        let preferred = profile.preferred.get(S::CATEGORY);
        if list.is_empty() && preferred.is_none() {
            return Ok(None);
        }
        self.resolve::<S>(list, preferred, init, cancel).await.map(Some)
    }
}

/// The backends owned by one session.
pub struct SessionServices {
    pub text_gen: Arc<BoxTextGen>,
    pub text_to_speech: Option<Arc<BoxTextToSpeech>>,
    pub speech_to_text: Option<Arc<BoxSpeechToText>>,
    pub action_inference: Option<Arc<BoxActionInference>>,
    pub summarization: Option<Arc<BoxSummarization>>,
    links: BTreeMap<ServiceCategory, ServiceLink>,
}

impl SessionServices {
    /// Bundle with only text generation; attach the rest with the `with_*` builders.
    pub fn new(text_gen: BoxTextGen) -> Self {
        let mut links = BTreeMap::new();
        links.insert(
            ServiceCategory::TextGen,
            ServiceLink::named(text_gen.service_name()),
        );
        Self {
            text_gen: Arc::new(text_gen),
            text_to_speech: None,
            speech_to_text: None,
            action_inference: None,
            summarization: None,
            links,
        }
    }

    pub fn with_text_to_speech(mut self, service: BoxTextToSpeech) -> Self {
        self.links.insert(
            ServiceCategory::TextToSpeech,
            ServiceLink::named(service.service_name()),
        );
        self.text_to_speech = Some(Arc::new(service));
        self
    }

    pub fn with_speech_to_text(mut self, service: BoxSpeechToText) -> Self {
        self.links.insert(
            ServiceCategory::SpeechToText,
            ServiceLink::named(service.service_name()),
        );
        self.speech_to_text = Some(Arc::new(service));
        self
    }

    pub fn with_action_inference(mut self, service: BoxActionInference) -> Self {
        self.links.insert(
            ServiceCategory::ActionInference,
            ServiceLink::named(service.service_name()),
        );
        self.action_inference = Some(Arc::new(service));
        self
    }

    pub fn with_summarization(mut self, service: BoxSummarization) -> Self {
        self.links.insert(
            ServiceCategory::Summarization,
            ServiceLink::named(service.service_name()),
        );
        self.summarization = Some(Arc::new(service));
        self
    }

    /// Category to link summary, as sent to the client in `ready`.
    pub fn links(&self) -> &BTreeMap<ServiceCategory, ServiceLink> {
        &self.links
    }

    /// Dispose every owned backend.
    pub async fn dispose(&self) {
        self.text_gen.dispose().await;
        if let Some(s) = &self.text_to_speech {
            s.dispose().await;
        }
        if let Some(s) = &self.speech_to_text {
            s.dispose().await;
        }
        if let Some(s) = &self.action_inference {
            s.dispose().await;
        }
        if let Some(s) = &self.summarization {
            s.dispose().await;
        }
    }
}
