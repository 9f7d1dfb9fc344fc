mod sampler;
mod template;

pub use sampler::SamplerProvider;
pub use template::TemplateExtractor;
