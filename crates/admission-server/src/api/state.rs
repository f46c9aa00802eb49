use admission_evaluator::config_validation::ConfigValidationEngine;
use admission_evaluator::mutation::MutationEngine;

pub(crate) struct ApiServerState {
    pub(crate) mutation_engine: MutationEngine,
    pub(crate) config_validation_engine: ConfigValidationEngine,
}
