pub mod ingress;

pub use ingress::{
    HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressTLS,
    TCPIngressRuleValue, VoyagerIngress, VoyagerIngressSpec,
};
